use dust_ask_protocol::{EventEnvelope, EventSender, EventStream, event_channel};
use tokio::select;
use tracing::Instrument;

use crate::io::Sse;

/// Spawns a task that decodes frames from `sse` into a bounded queue
/// and returns the consuming end.
pub fn spawn_event_stream(sse: Sse, capacity: usize) -> EventStream {
    let (tx, stream) = event_channel(capacity);
    tokio::spawn(pump_events(sse, tx).instrument(trace_span!("event stream")));
    stream
}

async fn pump_events(mut sse: Sse, tx: EventSender) {
    loop {
        // Keep-alive comments produce no frame, so an idle stream would
        // otherwise hold the connection until the server closes it.
        let next = select! {
            next = sse.next_frame() => next,
            _ = tx.closed() => {
                debug!("event stream consumer has gone away");
                break;
            }
        };
        let frame = match next {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                trace!("event stream ended");
                break;
            }
            Err(err) => {
                error!("error reading stream: {err:?}");
                break;
            }
        };
        if frame.data.is_empty() {
            continue;
        }

        let event = match EventEnvelope::decode(&frame.data) {
            Ok(envelope) => envelope.data,
            Err(err) => {
                error!("failed parsing chunk from Dust API: {err}");
                continue;
            }
        };
        trace!("got stream event: {}", event.kind());

        if !tx.send(event).await {
            debug!("event stream consumer has gone away");
            break;
        }
    }
}
