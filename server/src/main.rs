use chunked_upload::{Coordinator, UploadConfig};
use rocket::figment::{Figment, Provider};
use rocket::{routes, Build, Rocket};
use tracing::info;

mod error;
mod routes;

/// Base64 request bodies are a third larger than the chunk they carry.
fn json_limit(chunk_size: u64) -> u64 {
    chunk_size.saturating_mul(4) / 3 + 64 * 1024
}

pub fn build_rocket<P: Provider>(provider: P, coordinator: Coordinator) -> Rocket<Build> {
    let figment = Figment::from(provider).merge(("limits.json", json_limit(coordinator.chunk_size())));

    rocket::custom(figment)
        .manage(coordinator)
        .mount("/", routes![routes::health])
        .mount(
            "/api",
            routes![
                routes::insert_file,
                routes::upload_chunk,
                routes::finalize_chunk,
                routes::finalize_file,
                routes::list_files,
                routes::find_file,
                routes::find_file_chunks,
                routes::find_file_chunk,
                routes::verify_file,
                routes::mark_file_failed,
                routes::abandon_file,
                routes::delete_file,
            ],
        )
}

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let figment = rocket::Config::figment();
    let config: UploadConfig = if figment.find_value("upload").is_ok() {
        figment.extract_inner("upload")?
    } else {
        UploadConfig::default()
    };

    let coordinator = Coordinator::from_config(&config).await?;
    info!("Upload API starting with {} byte chunks", coordinator.chunk_size());

    build_rocket(figment, coordinator).launch().await?;
    Ok(())
}
