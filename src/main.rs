use term_chat::app;
use term_chat::config::EnvConfig;
use term_chat::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = EnvConfig::from_env();
    let _log_guard = match logging::init(&config) {
        Ok(guard) => Some(guard),
        Err(error) => {
            eprintln!("term-chat: logging disabled: {error:#}");
            None
        }
    };
    app::run(config).await
}
