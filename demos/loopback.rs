//! Two sessions talking over an in-memory link.
//!
//! A "sensor" node streams readings to a "hub"; the hub acknowledges each
//! one. The sensor link is slow, so the flow stats show the scheduler
//! throttling.
//!
//! Run with `RUST_LOG=eventlink=debug cargo run --example loopback` to see
//! per-chunk logging.

use std::sync::Arc;
use std::time::Duration;

use eventlink::transport::{ChannelTransport, DEFAULT_CHANNEL_CAPACITY};
use eventlink::{EventContext, HandlerFilter, SendOptions, Session, SessionConfig};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const HUB: u8 = 0x01;
const SENSOR: u8 = 0x10;

#[derive(Debug, Serialize, Deserialize)]
struct Reading {
    seq: u32,
    celsius: f32,
}

#[tokio::main]
async fn main() -> eventlink::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (sensor_end, hub_end) = ChannelTransport::pair(DEFAULT_CHANNEL_CAPACITY);
    let slow_link = sensor_end.transport.with_latency(Duration::from_millis(220));

    let sensor = Arc::new(Session::new(SessionConfig::with_addr(SENSOR), Arc::new(slow_link))?);
    let hub_config = SessionConfig {
        local_addr: HUB,
        filter_by_address: true,
        ..SessionConfig::default()
    };
    let hub = Arc::new(Session::new(hub_config, Arc::new(hub_end.transport))?);

    // Hub: log every frame on the wire, decode readings, queue acks
    hub.on_raw_frame(HandlerFilter::any(), |raw: &[u8]| {
        tracing::debug!(len = raw.len(), "raw frame");
        Ok(())
    });
    let (ack_tx, mut ack_rx) = mpsc::unbounded_channel();
    hub.on_json(HandlerFilter::event("reading").sender(SENSOR), move |r: Reading, ctx: &EventContext<'_>| {
        tracing::info!(seq = r.seq, celsius = r.celsius, "hub got reading");
        let _ = ack_tx.send((ctx.reply_options(), r.seq));
        Ok(())
    });
    hub.on_unhandled(HandlerFilter::any(), |ctx: &EventContext<'_>| {
        tracing::warn!(event = ctx.name(), "hub ignored event");
        Ok(())
    });

    // Sensor: count acks
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    sensor.on_event(HandlerFilter::event("ack").sender(HUB), move |ctx: &EventContext<'_>| {
        let _ = done_tx.send(ctx.payload().to_string());
        Ok(())
    });

    let _hub_pump = hub.spawn_inbound(0, hub_end.notifications);
    let _sensor_pump = sensor.spawn_inbound(0, sensor_end.notifications);

    let acker = {
        let hub = hub.clone();
        tokio::spawn(async move {
            while let Some((opts, seq)) = ack_rx.recv().await {
                if let Err(e) = hub.send("ack", &seq.to_string(), opts).await {
                    tracing::error!(error = %e, "ack failed");
                }
            }
        })
    };

    const READINGS: u32 = 5;
    for seq in 0..READINGS {
        let reading = Reading {
            seq,
            celsius: 20.0 + seq as f32 * 0.5,
        };
        sensor.send_json("reading", &reading, SendOptions::to(HUB)).await?;
        tracing::info!(stats = ?sensor.flow_stats(), "sensor flow");
    }
    sensor.send("diagnostics", "uptime=42s", SendOptions::to(HUB)).await?;

    for _ in 0..READINGS {
        if let Some(seq) = done_rx.recv().await {
            tracing::info!(seq = %seq, "sensor got ack");
        }
    }

    let stats = serde_json::to_string(&sensor.flow_stats())?;
    println!("final sensor flow stats: {stats}");

    acker.abort();
    Ok(())
}
