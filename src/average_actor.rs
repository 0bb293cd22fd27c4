use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use ractor::{
    cast, concurrency::JoinHandle, rpc::CallResult, Actor, ActorProcessingErr, ActorRef,
    RpcReplyPort,
};
use tracing::debug;

use crate::{avg_range::MovingAverage, time_data::TimeData};

/// Owns a [`MovingAverage`] so that it can be fed and read from many tasks.
///
/// Every operation goes through the actor's mailbox, one at a time, so an
/// add and its eviction are never interleaved with anything else.
#[derive(Debug)]
pub struct AverageActor;

pub enum AverageMsg {
    AddData(TimeData),
    AddList(Vec<TimeData>),
    Reset,
    SetPeriod(usize),
    Average(RpcReplyPort<f64>),
    /// Measured back from the given time, which is when the caller asked.
    TimeBasedAverage(Duration, DateTime<Utc>, RpcReplyPort<f64>),
    Window(RpcReplyPort<VecDeque<TimeData>>),
    FirstEntry(RpcReplyPort<Option<TimeData>>),
    LastEntry(RpcReplyPort<Option<TimeData>>),
    TimeSpan(RpcReplyPort<Option<Duration>>),
    Period(RpcReplyPort<usize>),
    IsFilling(RpcReplyPort<bool>),
    Len(RpcReplyPort<usize>),
}

#[derive(Debug, thiserror::Error)]
pub enum AverageError {
    #[error("Failed to start the moving average actor: {0}")]
    Spawn(String),
    #[error("Failed to reach the moving average actor: {0}")]
    Messaging(String),
    #[error("The moving average actor stopped before replying")]
    NoReply,
}

fn reply<T>(port: RpcReplyPort<T>, value: T) {
    if port.send(value).is_err() {
        debug!("Caller went away before the reply was sent");
    }
}

#[async_trait::async_trait]
impl Actor for AverageActor {
    type Msg = AverageMsg;
    type State = MovingAverage;
    /// The initial period.
    type Arguments = usize;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self>,
        period: usize,
    ) -> Result<Self::State, ActorProcessingErr> {
        debug!("Starting moving average actor with period {}", period);
        Ok(MovingAverage::with_period(period))
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        debug!("Moving average actor stopped with {} samples", state.len());
        Ok(())
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            AverageMsg::AddData(data) => state.add_data(data),
            AverageMsg::AddList(data) => state.add_list_of_data(data),
            AverageMsg::Reset => state.reset(),
            AverageMsg::SetPeriod(period) => state.set_period(period),
            AverageMsg::Average(port) => reply(port, state.average()),
            AverageMsg::TimeBasedAverage(duration, now, port) => {
                reply(port, state.time_based_average_at(duration, now))
            }
            AverageMsg::Window(port) => reply(port, state.window()),
            AverageMsg::FirstEntry(port) => reply(port, state.first_entry()),
            AverageMsg::LastEntry(port) => reply(port, state.last_entry()),
            AverageMsg::TimeSpan(port) => reply(port, state.time_span()),
            AverageMsg::Period(port) => reply(port, state.period()),
            AverageMsg::IsFilling(port) => reply(port, state.is_filling()),
            AverageMsg::Len(port) => reply(port, state.len()),
        }

        Ok(())
    }
}

/// A cloneable way to talk to an [`AverageActor`].
#[derive(Debug, Clone)]
pub struct AverageHandle {
    actor: ActorRef<AverageActor>,
}

impl AverageHandle {
    /// Spawn a new actor holding an empty window of `period` samples.
    pub async fn spawn(period: usize) -> Result<(Self, JoinHandle<()>), AverageError> {
        let (actor, handle) = Actor::spawn(None, AverageActor, period)
            .await
            .map_err(|err| AverageError::Spawn(err.to_string()))?;
        Ok((AverageHandle { actor }, handle))
    }

    /// Spawn with the period taken from `MOVING_AVERAGE_PERIOD`.
    pub async fn spawn_from_env() -> Result<(Self, JoinHandle<()>), AverageError> {
        Self::spawn(MovingAverage::from_env().period()).await
    }

    fn send(&self, message: AverageMsg) -> Result<(), AverageError> {
        cast!(self.actor, message).map_err(|err| AverageError::Messaging(err.to_string()))
    }

    async fn query<T, F>(&self, message: F) -> Result<T, AverageError>
    where
        T: Send + 'static,
        F: FnOnce(RpcReplyPort<T>) -> AverageMsg,
    {
        let result = self
            .actor
            .call(message, None)
            .await
            .map_err(|err| AverageError::Messaging(err.to_string()))?;
        match result {
            CallResult::Success(value) => Ok(value),
            _ => Err(AverageError::NoReply),
        }
    }

    pub fn add_data(&self, data: TimeData) -> Result<(), AverageError> {
        self.send(AverageMsg::AddData(data))
    }

    /// The sample is stamped here, not when the actor gets to it.
    pub fn add_value(&self, value: f64) -> Result<(), AverageError> {
        self.add_data(TimeData::new(value))
    }

    pub fn add_list_of_data<I>(&self, data: I) -> Result<(), AverageError>
    where
        I: IntoIterator<Item = TimeData>,
    {
        self.send(AverageMsg::AddList(data.into_iter().collect()))
    }

    pub fn reset(&self) -> Result<(), AverageError> {
        self.send(AverageMsg::Reset)
    }

    pub fn set_period(&self, period: usize) -> Result<(), AverageError> {
        self.send(AverageMsg::SetPeriod(period))
    }

    pub async fn average(&self) -> Result<f64, AverageError> {
        self.query(AverageMsg::Average).await
    }

    /// # Panics
    ///
    /// If `duration` is negative. The check happens in the calling task, the
    /// actor is left running.
    pub async fn time_based_average_of(&self, duration: Duration) -> Result<f64, AverageError> {
        assert!(duration >= Duration::zero(), "Time period must be positive");
        let now = Utc::now();
        self.query(|port| AverageMsg::TimeBasedAverage(duration, now, port))
            .await
    }

    pub async fn window(&self) -> Result<VecDeque<TimeData>, AverageError> {
        self.query(AverageMsg::Window).await
    }

    pub async fn first_entry(&self) -> Result<Option<TimeData>, AverageError> {
        self.query(AverageMsg::FirstEntry).await
    }

    pub async fn last_entry(&self) -> Result<Option<TimeData>, AverageError> {
        self.query(AverageMsg::LastEntry).await
    }

    pub async fn time_span(&self) -> Result<Option<Duration>, AverageError> {
        self.query(AverageMsg::TimeSpan).await
    }

    pub async fn period(&self) -> Result<usize, AverageError> {
        self.query(AverageMsg::Period).await
    }

    pub async fn is_filling(&self) -> Result<bool, AverageError> {
        self.query(AverageMsg::IsFilling).await
    }

    pub async fn len(&self) -> Result<usize, AverageError> {
        self.query(AverageMsg::Len).await
    }

    /// Stop the actor. Messages already in its mailbox may be dropped.
    pub fn stop(&self) {
        self.actor.stop(None);
    }
}
