use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::model::Event;
use crate::wal::Wal;

/// Durable store behind the engine. An `append` that returns `Ok` must
/// survive a restart.
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn append(&self, event: &Event) -> io::Result<()>;

    /// Replace the log with `events`, the minimal history for the current state.
    async fn compact(&self, events: Vec<Event>) -> io::Result<()>;

    async fn appends_since_compact(&self) -> u64;
}

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type Pending = (Event, oneshot::Sender<io::Result<()>>);

/// [`EventLog`] over a [`Wal`] file, owned by a background task that batches
/// concurrent appends into a single fsync.
pub struct GroupCommitLog {
    tx: mpsc::Sender<WalCommand>,
}

impl GroupCommitLog {
    /// Open the file and spawn the writer. Must be called inside a runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let wal = Wal::open(path)?;
        let (tx, rx) = mpsc::channel(4096);
        tokio::spawn(writer_loop(wal, rx));
        Ok(Self { tx })
    }

    async fn request<T>(
        &self,
        cmd: WalCommand,
        rx: oneshot::Receiver<io::Result<T>>,
    ) -> io::Result<T> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| io::Error::other("journal writer shut down"))?;
        rx.await
            .map_err(|_| io::Error::other("journal writer dropped response"))?
    }
}

#[async_trait]
impl EventLog for GroupCommitLog {
    async fn append(&self, event: &Event) -> io::Result<()> {
        let (response, rx) = oneshot::channel();
        let cmd = WalCommand::Append {
            event: event.clone(),
            response,
        };
        self.request(cmd, rx).await
    }

    async fn compact(&self, events: Vec<Event>) -> io::Result<()> {
        let (response, rx) = oneshot::channel();
        self.request(WalCommand::Compact { events, response }, rx).await
    }

    async fn appends_since_compact(&self) -> u64 {
        let (response, rx) = oneshot::channel();
        if self
            .tx
            .send(WalCommand::AppendsSinceCompact { response })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

/// 1. Block until a command arrives.
/// 2. For an append, drain every append already queued behind it.
/// 3. One fsync for the batch, then answer every sender.
async fn writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_other(&mut wal, other);
                continue;
            }
        };

        let mut batch: Vec<Pending> = vec![(event, response)];
        let mut deferred = None;
        while let Ok(next) = rx.try_recv() {
            match next {
                WalCommand::Append { event, response } => batch.push((event, response)),
                other => {
                    deferred = Some(other);
                    break;
                }
            }
        }

        metrics::histogram!(crate::observability::JOURNAL_FLUSH_BATCH_SIZE)
            .record(batch.len() as f64);
        let started = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::JOURNAL_FLUSH_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            tracing::error!("journal flush of {} records failed: {e}", batch.len());
        }
        for (_, tx) in batch {
            let r = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = tx.send(r);
        }

        if let Some(cmd) = deferred {
            handle_other(&mut wal, cmd);
        }
    }
}

/// All or nothing: a failed batch is rolled back before its senders hear
/// about it, so none of its records can surface on replay.
fn flush_batch(wal: &mut Wal, batch: &[Pending]) -> io::Result<()> {
    let appended = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    match appended {
        Ok(()) => wal.commit(),
        Err(e) => {
            if let Err(discard) = wal.discard_uncommitted() {
                tracing::error!("journal rollback after failed append failed: {discard}");
            }
            Err(e)
        }
    }
}

fn handle_other(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the caller"),
    }
}
