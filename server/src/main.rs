#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();
    let config = taskcollide_server::config::Config::from_env()?;
    taskcollide_server::web::start_web_server(config).await
}
