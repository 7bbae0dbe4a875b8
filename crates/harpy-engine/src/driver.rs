use crate::config::EngineConfig;
use crate::error::Result;
use crate::machine::Machine;
use crate::scheduler::{Scheduler, TokioScheduler};
use futures::stream::{self, Stream, StreamExt};
use harpy_core::har::{Entry, Request};

/// How one request of a batch ended.
#[derive(Debug)]
pub struct Outcome {
    /// Position of the request in the input.
    pub index: usize,
    /// The request's `_sequence`, if it carried one.
    pub sequence: Option<i64>,
    pub result: Result<Entry>,
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs many [`Machine`]s cooperatively on the calling task.
///
/// Requests start in input order, at most `max_in_flight` at a time, and
/// their outcomes are yielded in whatever order they finish. A failed request
/// never stops the others.
pub struct Driver<S: Scheduler> {
    scheduler: S,
    config: EngineConfig,
}

impl<S: Scheduler> Driver<S> {
    pub fn new(scheduler: S, config: EngineConfig) -> Self {
        Self { scheduler, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn run<'a, I>(&'a self, requests: I) -> impl Stream<Item = Outcome> + 'a
    where
        I: IntoIterator<Item = Request>,
        I::IntoIter: 'a,
    {
        let in_flight = self.config.max_in_flight.max(1);

        stream::iter(requests.into_iter().enumerate())
            .map(move |(index, request)| {
                let machine = Machine::new(&self.scheduler, &self.config, request);
                let sequence = machine.sequence();
                tracing::debug!("Starting request {} (sequence {:?})", index, sequence);

                async move {
                    Outcome {
                        index,
                        sequence,
                        result: machine.run().await,
                    }
                }
            })
            .buffer_unordered(in_flight)
    }

    /// Run every request and collect the outcomes in completion order.
    pub async fn run_to_completion<I>(&self, requests: I) -> Vec<Outcome>
    where
        I: IntoIterator<Item = Request>,
    {
        let outcomes: Vec<Outcome> = self.run(requests).collect().await;

        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        tracing::info!(
            "Replayed {} requests ({} failed)",
            outcomes.len(),
            failed
        );

        outcomes
    }
}

impl Driver<TokioScheduler> {
    /// Driver over real TCP sockets.
    pub fn tokio(config: EngineConfig) -> Self {
        Self::new(TokioScheduler::new(config.max_response_bytes), config)
    }
}
