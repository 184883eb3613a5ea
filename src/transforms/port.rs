//! Ports: bounded block channels between transforms
//!
//! Every edge of the pipeline is one `tokio::sync::mpsc` channel. A push
//! suspends while the channel is full and a pull suspends while it is empty,
//! so backpressure needs no extra protocol. Both suspend points race the
//! pipeline's cancellation token.

use std::future::poll_fn;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::Transform;
use crate::datablocks::BlockRef;
use crate::errors::{ExecError, ExecResult};

/// Receiving end of one edge
#[derive(Debug)]
pub struct InputPort {
    receiver: mpsc::Receiver<BlockRef>,
    upstream: String,
}

impl InputPort {
    pub fn new(receiver: mpsc::Receiver<BlockRef>, upstream: impl Into<String>) -> Self {
        Self {
            receiver,
            upstream: upstream.into(),
        }
    }

    /// Name of the transform feeding this port
    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Pulls the next block; `None` once the producer has finished
    pub async fn pull(&mut self, cancel: &CancellationToken) -> ExecResult<Option<BlockRef>> {
        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExecError::Cancelled),
            block = self.receiver.recv() => Ok(block),
        }
    }
}

/// Sending end of every edge leaving a transform.
///
/// With several consumers each block is delivered to all of them by
/// shared reference.
#[derive(Debug, Default)]
pub struct OutputPort {
    senders: Vec<mpsc::Sender<BlockRef>>,
}

impl OutputPort {
    pub fn attach(&mut self, sender: mpsc::Sender<BlockRef>) {
        self.senders.push(sender);
    }

    pub fn is_connected(&self) -> bool {
        !self.senders.is_empty()
    }

    pub fn consumers(&self) -> usize {
        self.senders.len()
    }

    /// Pushes a block to every live consumer.
    ///
    /// Consumers that hung up are detached. Returns false once no consumer
    /// is left, which lets the producer stop early.
    pub async fn push(&mut self, block: BlockRef, cancel: &CancellationToken) -> ExecResult<bool> {
        let mut i = 0;
        while i < self.senders.len() {
            if cancel.is_cancelled() {
                return Err(ExecError::Cancelled);
            }
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ExecError::Cancelled),
                res = self.senders[i].send(block.clone()) => res.is_ok(),
            };
            if sent {
                i += 1;
            } else {
                self.senders.remove(i);
            }
        }
        Ok(!self.senders.is_empty())
    }
}

/// All ports owned by one transform
#[derive(Debug, Default)]
pub struct TransformPorts {
    pub inputs: Vec<InputPort>,
    pub output: OutputPort,
}

impl TransformPorts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the ports out, leaving the transform unwired
    pub fn take(&mut self) -> TransformPorts {
        std::mem::take(self)
    }
}

/// Wires `upstream`'s output to a new input port of `downstream`
pub fn connect(upstream: &mut dyn Transform, downstream: &mut dyn Transform, capacity: usize) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let from = upstream.name().to_string();
    upstream.ports_mut().output.attach(tx);
    downstream.ports_mut().inputs.push(InputPort::new(rx, from));
}

/// Reader over several input ports.
///
/// Waits on every input at once and takes the first block available.
/// When several inputs are ready they are served round-robin in wiring
/// order. Exhausted inputs drop out of the rotation.
#[derive(Debug)]
pub(crate) struct FanIn {
    inputs: Vec<InputPort>,
    next: usize,
}

impl FanIn {
    pub(crate) fn new(inputs: Vec<InputPort>) -> Self {
        Self { inputs, next: 0 }
    }

    pub(crate) async fn pull(&mut self, cancel: &CancellationToken) -> ExecResult<Option<BlockRef>> {
        while !self.inputs.is_empty() {
            if cancel.is_cancelled() {
                return Err(ExecError::Cancelled);
            }
            let (idx, block) = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ExecError::Cancelled),
                ready = poll_fn(|cx| self.poll_ready(cx)) => ready,
            };
            match block {
                Some(block) => {
                    self.next = idx + 1;
                    return Ok(Some(block));
                }
                None => {
                    // the following input slides into idx
                    self.inputs.remove(idx);
                    self.next = idx;
                }
            }
        }
        Ok(None)
    }

    /// Polls every input starting at `next`; the first ready one wins
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<(usize, Option<BlockRef>)> {
        let len = self.inputs.len();
        for offset in 0..len {
            let idx = (self.next + offset) % len;
            if let Poll::Ready(block) = self.inputs[idx].receiver.poll_recv(cx) {
                return Poll::Ready((idx, block));
            }
        }
        Poll::Pending
    }

    /// Drops every input so upstream producers see the edge close
    pub(crate) fn close(&mut self) {
        self.inputs.clear();
    }
}
