use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use futures_util::StreamExt;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, Portfolio, Unit};
use paper::{Platform, Replay, Scenario};
use rules::{CandleRules, ConnectorRules, DepthRules, OrderRules, PortfolioRules, SecurityRules};
use rx::{from_event0, CompositeSubscription, Event0, Hook};
use surface::{Connector, RxConnector, RxLogSource, RxStrategy, SecurityProvider};

fn shutdown_event(event: &Event0) -> &Event0 {
    event
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ───────────────────────────────────────────────────────────────
    let cfg = Config::from_env()?;
    let scenario = Scenario::load(&cfg.scenario_path)?;
    info!(scenario = %scenario.name, slippage_bps = cfg.slippage_bps, "rxreplay starting");

    // ── Platform ─────────────────────────────────────────────────────────────
    let platform = Platform::build(&cfg, &scenario);
    let connector = Arc::clone(&platform.connector);
    let watch = CompositeSubscription::new();
    let attached = Arc::new(CompositeSubscription::new());

    // ── Connection bindings ──────────────────────────────────────────────────
    watch.add(
        connector
            .rx_connected_ex()
            .subscribe_fn(|adapter| info!(adapter = %adapter.name, "venue connected")),
    );
    watch.add(
        connector
            .rx_connection_error()
            .subscribe_fn(|error| warn!(error = %error.message, "venue connection error")),
    );
    watch.add(connector.rx_restored().subscribe_fn(|_| info!("venue restored")));
    watch.add(connector.rx_session_state_changed().subscribe_fn(|change| {
        info!(board = %change.board, state = %change.state, "session")
    }));
    watch.add(
        connector
            .rx_new_news()
            .subscribe_fn(|news| info!(headline = %news.headline, "news")),
    );
    watch.add(
        connector
            .rx_mass_order_canceled()
            .subscribe_fn(|id| info!(transaction_id = id, "all orders canceled")),
    );
    watch.add(
        connector
            .rx_log()
            .subscribe_fn(|entry| debug!(source = %entry.source, level = ?entry.level, "{}", entry.message)),
    );

    // ── Rules ────────────────────────────────────────────────────────────────
    watch.add(
        connector
            .when_interval_elapsed(Duration::minutes(1))
            .subscribe_fn(|at| info!(%at, "market minute")),
    );
    watch.add(
        connector
            .when_time_come([scenario.start + Duration::minutes(5)])
            .subscribe_fn(|at| info!(%at, "five minutes into the session")),
    );

    for series in &platform.series {
        let label = series.to_string();
        watch.add(
            platform
                .candles
                .when_candles_finished(series)
                .subscribe_fn(move |candle| {
                    info!(
                        series = %label,
                        open = candle.open_price,
                        high = candle.high_price,
                        low = candle.low_price,
                        close = candle.close_price,
                        volume = candle.total_volume,
                        "candle finished"
                    )
                }),
        );
    }

    for spec in &scenario.securities {
        let Some(security) = connector.securities().lookup_security(&spec.to_security().id) else {
            continue;
        };
        watch.add(
            security
                .when_new_trade(&connector)
                .subscribe_fn(|trade| debug!(security = %trade.security_id, price = trade.price, "tape")),
        );
        watch.add(
            security
                .when_last_trade_price_more(&connector, Unit::Percent(1.0))
                .take(1)
                .subscribe_fn(|trade| info!(security = %trade.security_id, price = trade.price, "price up 1%")),
        );
        watch.add(
            security
                .when_last_trade_price_less(&connector, Unit::Percent(1.0))
                .take(1)
                .subscribe_fn(|trade| info!(security = %trade.security_id, price = trade.price, "price down 1%")),
        );
    }

    for spec in &scenario.portfolios {
        let portfolio = Portfolio::new(&spec.name, spec.value.unwrap_or(cfg.initial_capital));
        watch.add(
            portfolio
                .when_money_less(&connector, Unit::Percent(5.0))
                .take(1)
                .subscribe_fn(|p| warn!(portfolio = %p.name, cash = p.current_value, "cash down 5%")),
        );
    }

    // Books appear with their first update; spread rules attach then.
    let venue = Arc::clone(&connector);
    let spread_rules = Arc::clone(&attached);
    watch.add(connector.rx_new_market_depth().subscribe_fn(move |depth| {
        let Some(book) = venue.market_depth(&depth.security_id) else {
            return;
        };
        let security = depth.security_id.clone();
        spread_rules.add(
            book.when_spread_more(Unit::Percent(100.0))
                .subscribe_fn(move |d| warn!(security = %security, spread = ?d.spread(), "spread doubled")),
        );
    }));

    // Every order the strategy places gets its own fill and cancel rules.
    if let Some(strategy) = &platform.strategy {
        let venue = Arc::clone(&connector);
        let order_rules = Arc::clone(&attached);
        watch.add(strategy.rx_order_registered().subscribe_fn(move |order| {
            order_rules.add(order.when_matched(&venue).take(1).subscribe_fn(|fill| {
                info!(
                    order = fill.order.transaction_id,
                    price = fill.trade.price,
                    volume = fill.trade.volume,
                    "order matched"
                )
            }));
            order_rules.add(order.when_canceled(&venue).take(1).subscribe_fn(|o| {
                info!(order = o.transaction_id, balance = o.balance, "order canceled")
            }));
        }));
        watch.add(
            strategy
                .rx_order_register_failed()
                .subscribe_fn(|fail| warn!(order = %fail.order, error = %fail.error.message, "order refused")),
        );
        watch.add(
            strategy
                .rx_process_state_changed()
                .subscribe_fn(|state| info!(%state, "strategy state")),
        );
    }

    // ── Own trades ───────────────────────────────────────────────────────────
    let shutdown = Arc::new(Event0::default());
    let finished = connector
        .rx_disconnected()
        .merge(from_event0(Hook::on(Arc::clone(&shutdown), shutdown_event)));
    let mut fills = connector.when_new_my_trade().take_until(finished).into_stream();
    let consumer = tokio::spawn(async move {
        let mut count = 0usize;
        let mut volume = 0.0;
        while let Some(item) = fills.next().await {
            match item {
                Ok(fill) => {
                    count += 1;
                    volume += fill.trade.volume;
                    info!(
                        order = fill.order.transaction_id,
                        side = %fill.order.side,
                        price = fill.trade.price,
                        volume = fill.trade.volume,
                        "fill"
                    );
                }
                Err(err) => {
                    warn!(error = %err, "fill stream failed");
                    break;
                }
            }
        }
        (count, volume)
    });

    // ── Replay ───────────────────────────────────────────────────────────────
    let applied = Replay::new(&scenario)
        .with_pace(StdDuration::from_millis(cfg.pace_ms))
        .run(&platform)
        .await?;

    shutdown.raise();
    connector.disconnect();
    let (fill_count, fill_volume) = consumer.await?;

    let now = connector.current_time();
    match &platform.strategy {
        Some(strategy) => info!(
            steps = applied,
            fills = fill_count,
            volume = fill_volume,
            position = strategy.position(),
            pnl = strategy.pnl(),
            market_time = %now,
            "replay complete"
        ),
        None => info!(steps = applied, fills = fill_count, market_time = %now, "replay complete"),
    }

    attached.dispose();
    watch.dispose();
    Ok(())
}
