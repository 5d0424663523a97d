use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use marketbell::{
    config::{Cli, Config, DomainName},
    gateway::HttpGateway,
    presentation::{priority_color, priority_label, relative_time, Presentation},
    Admin, NotificationStore, Supplier,
};
use serde_json::json;
use std::{fs::File, sync::Arc};
use tokio::select;
use tracing::{info, level_filters::LevelFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.conf {
        Some(ref conf) => Config::load(conf)?,
        None => Config::default(),
    };
    if let Some(domain) = cli.domain {
        config.domain = domain;
    }

    let mut log_fmt = tracing_subscriber::fmt();
    if let Some(ref level) = config.log_level {
        if let Ok(lv) = level.as_str().parse::<LevelFilter>() {
            log_fmt = log_fmt.with_max_level(lv);
        }
    }

    let mut _guard = None;
    if let Some(ref log_file) = config.log_file {
        let file = File::create(log_file)
            .with_context(|| format!("failed to create log file {}", log_file))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        _guard = Some(guard);
        log_fmt.with_writer(non_blocking).try_init().ok();
    } else {
        log_fmt.with_writer(std::io::stderr).try_init().ok();
    }

    match config.domain {
        DomainName::Admin => run::<Admin>(config, cli.once).await,
        DomainName::Supplier => run::<Supplier>(config, cli.once).await,
    }
}

async fn run<D: Presentation>(config: Config, once: bool) -> Result<()> {
    let gateway = Arc::new(HttpGateway::<D>::new(&config.http)?);
    let store = NotificationStore::<D>::new(gateway, config.store.clone());

    if once {
        return print_snapshot(&store).await;
    }

    let token = store.add_listener(|counts| {
        info!(
            domain = D::NAME,
            total = counts.total,
            unread = counts.unread,
            urgent = counts.urgent,
            today = counts.today,
            "notification counts changed"
        );
        Ok(())
    });
    store.start_polling_default();

    info!(
        domain = D::NAME,
        base_url = %config.http.base_url,
        interval_ms = config.store.poll_interval_ms,
        "Starting marketbell"
    );
    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received CTRL+C, shutting down");
        }
    }
    store.remove_listener(token);
    store.stop_polling();
    Ok(())
}

async fn print_snapshot<D: Presentation>(store: &NotificationStore<D>) -> Result<()> {
    let counts = store
        .get_notification_counts()
        .await
        .with_context(|| format!("failed to fetch {} notifications", D::NAME))?;
    let now = Utc::now();
    let unread: Vec<_> = store
        .get_unread_notifications()
        .await?
        .iter()
        .map(|record| {
            json!({
                "id": record.id,
                "title": record.title,
                "icon": D::icon(&record.kind, &record.category),
                "kind": D::kind_label(&record.kind),
                "category": D::category_label(&record.category),
                "priority": priority_label(record.priority),
                "color": priority_color(record.priority),
                "age": relative_time(record.created_at, now),
            })
        })
        .collect();
    let snapshot = json!({
        "domain": D::NAME,
        "counts": counts,
        "unread": unread,
    });
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
