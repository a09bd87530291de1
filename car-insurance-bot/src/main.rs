use car_insurance_bot::{
    BotConfig, TelegramClient, TelegramMode, build_router, create_app_state, init_tracing,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};

const INBOUND_QUEUE_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(config.log_format);

    let telegram = TelegramClient::new(&config.telegram_token)?;
    let state = create_app_state(&config, telegram.clone());

    match config.mode {
        TelegramMode::Polling => {
            telegram.delete_webhook().await?;

            let (tx, rx) = mpsc::channel(INBOUND_QUEUE_CAPACITY);
            tokio::spawn(state.dispatcher.clone().run(rx));
            tokio::spawn(async move {
                if let Err(e) = telegram.run_poll_loop(tx).await {
                    error!("Telegram poll loop stopped: {e}");
                }
            });
            info!("Polling Telegram for updates");
        }
        TelegramMode::Webhook => {
            info!("Expecting Telegram updates on POST /telegram/webhook");
        }
    }

    let app = build_router(state);
    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    let addr = listener.local_addr()?;

    info!("Car insurance bot starting on {}", addr);
    info!("Health check endpoint: http://{}/health", addr);
    info!(
        price = %config.intake.price,
        documents_dir = %config.intake.documents_dir.display(),
        "Policy settings loaded"
    );

    axum::serve(listener, app).await?;

    Ok(())
}
