#![forbid(unsafe_code)]
#![warn(unused, clippy::cognitive_complexity, clippy::needless_return)]

use std::{sync::Arc, time::Duration};
use tickbar_data::{
    connection::{FeedConnection, ShutdownHandle},
    router::TickRouter,
    session::FeedEndpoint,
    store::HistoricalStore,
    transport::WsConnector,
};
use tickbar_strategy::{dispatch::ChannelDispatcher, pipeline::Pipeline};
use tickbar_trader::{
    client::{
        ClientError,
        auth::Authenticator,
        orders::{OrderClient, OrderTemplate, run_order_task},
        stream_id::StreamIdClient,
    },
    config::TraderConfig,
    error::TraderError,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(error) = run().await {
        error!(%error, "tickbar-trader stopped");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), TraderError> {
    let config = TraderConfig::from_env()?;
    info!(
        environment = %config.environment,
        api_url = %config.api_url,
        symbols = ?config.feed_symbols().collect::<Vec<_>>(),
        short_window = config.short_window,
        long_window = config.long_window,
        "starting tickbar-trader"
    );
    info!(
        account_id = %config.account_id,
        quantity = config.order_quantity,
        stop_loss_offset = %config.stop_loss_offset,
        take_profit_offset = %config.take_profit_offset,
        "orders are bracketed around the close of the crossing bar"
    );

    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(ClientError::from)?;

    let auth = Arc::new(Authenticator::new(
        http.clone(),
        config.api_url.clone(),
        config.credentials.clone(),
    ));
    let stream_ids = StreamIdClient::new(http.clone(), config.api_url.clone(), Arc::clone(&auth));
    let orders = OrderClient::new(http, config.api_url.clone(), Arc::clone(&auth));

    let (dispatcher, signals) = ChannelDispatcher::channel();
    let mut pipeline = Pipeline::new(config.pipeline_config(), dispatcher)?;
    let order_task = tokio::spawn(run_order_task(orders, config.order_template(), signals));

    let mut feed = FeedConnection::new(
        config.feed_config(),
        FeedEndpoint::new(config.api_url.clone()),
        WsConnector::new(config.read_timeout),
        auth,
        stream_ids,
    );
    spawn_shutdown_on_ctrl_c(feed.shutdown_handle());

    let mut router = TickRouter::new();
    let mut history = HistoricalStore::new(config.retention);

    let outcome = feed
        .run(|message| router.route(message, &mut history, &mut pipeline))
        .await;

    for symbol in config.feed_symbols() {
        let state = pipeline.detector().state(symbol);
        info!(
            %symbol,
            bars_30s = pipeline.tier1().sealed(symbol).count(),
            bars_1m = pipeline.tier2().sealed(symbol).count(),
            samples = pipeline.averages().samples(symbol).count(),
            historical_ticks = history.ticks(symbol).count(),
            last_signal = ?state.last_emitted,
            position = %state.position,
            "symbol summary"
        );
    }
    let stats = router.stats();
    info!(
        live = stats.live,
        historical = stats.historical,
        rejected_records = stats.rejected,
        ignored_messages = stats.ignored_messages,
        out_of_order_ticks = pipeline.rejected(),
        "feed summary"
    );

    // Closing the signal channel lets the order task drain and exit
    drop(pipeline);
    match order_task.await {
        Ok(summary) => info!(placed = summary.placed, failed = summary.failed, "orders summary"),
        Err(error) => error!(%error, "order task panicked"),
    }

    outcome.map_err(TraderError::from)
}

fn spawn_shutdown_on_ctrl_c(shutdown: ShutdownHandle) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested");
                shutdown.close();
            }
            Err(error) => error!(%error, "failed to listen for ctrl-c"),
        }
    });
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(cfg!(debug_assertions))
        .init();
}
