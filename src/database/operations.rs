/// Database operations for storing weather snapshots
use crate::database::connection::execute_with_retry;
use crate::models::Snapshot;

/// Store one assembled snapshot in the weather table.
///
/// Absent readings are stored as SQL NULL; "no data for this quantity" is
/// a fully valid row, not a failure. Transient database trouble is
/// absorbed by the connection retry helper.
pub async fn store_snapshot(snapshot: &Snapshot, database_url: &str) -> Result<(), String> {
    // Copy for move into the async closure
    let snapshot = *snapshot;

    execute_with_retry(database_url, move |client| {
        async move {
            let temperature = snapshot.temperature.into_option();
            let humidity = snapshot.humidity.into_option();
            let pressure = snapshot.pressure.into_option();
            // The integer columns are narrower in Rust than in SQL; widen
            // so the client can bind them.
            let rain_count = snapshot.rain_count.into_option().map(i64::from);
            let wind_heading = snapshot.wind_heading.into_option();
            let wind_avg_kph = snapshot.wind_avg_kph.into_option();
            let wind_max_kph = snapshot.wind_max_kph.into_option();
            let ambient_light = snapshot.ambient_light.into_option().map(i16::from);
            let system_temp = snapshot.system_temp.into_option();

            client
                .execute(
                    "INSERT INTO weather(captured_at, temperature, humidity, pressure, rain_count, \
                     wind_heading, wind_avg_kph, wind_max_kph, ambient_light, system_temp)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
                    &[
                        &snapshot.captured_at,
                        &temperature,
                        &humidity,
                        &pressure,
                        &rain_count,
                        &wind_heading,
                        &wind_avg_kph,
                        &wind_max_kph,
                        &ambient_light,
                        &system_temp,
                    ],
                )
                .await
        }
    })
    .await
}
