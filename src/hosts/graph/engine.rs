//! The processing engine - owns nodes, edges, and message queues.
//!
//! Nodes are stored type-erased in a petgraph `StableGraph` (stable indices
//! survive the node removals that source teardown produces) and processed
//! through dasp_graph. Each node gets a single-producer ring buffer for
//! parameter messages; the control side keeps the producer, the node drains
//! the consumer at the start of every block.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dasp_graph::{Buffer, Input, NodeData, Processor};
use hashbrown::HashMap;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use rtrb::{Consumer, Producer, RingBuffer};

use crate::hosts::graph::node::{GraphNode, NodeId, ProcessContext};

/// dasp_graph's fixed block size.
pub(crate) const BLOCK_FRAMES: u64 = 64;

/// Handle for sending messages to a node in an [`Engine`].
pub(crate) struct NodeHandle<M: Send + 'static> {
    id: NodeId,
    sender: Producer<M>,
    _marker: PhantomData<M>,
}

impl<M: Send + 'static> NodeHandle<M> {
    /// Send a message to the node (applied next process cycle).
    ///
    /// Returns Err if the queue is full (message dropped).
    pub fn send(&mut self, msg: M) -> Result<(), M> {
        self.sender.push(msg).map_err(|rtrb::PushError::Full(v)| v)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

// Type-erased wrapper so heterogeneous nodes share one graph
trait ErasedNode: Send {
    fn process_erased(&mut self, ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Buffer]);
}

struct NodeWrapper<N: GraphNode> {
    node: N,
    receiver: Consumer<N::Message>,
}

impl<N: GraphNode> ErasedNode for NodeWrapper<N> {
    fn process_erased(&mut self, ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Buffer]) {
        // Split borrow to avoid conflict between receiver and node
        let receiver = &mut self.receiver;
        let node = &mut self.node;

        // Draining iterator directly from the consumer - no allocation
        let messages = std::iter::from_fn(|| receiver.pop().ok());
        node.process(ctx, messages, inputs, outputs);
    }
}

// Adapter for dasp_graph. The frame clock is shared so every node sees the
// block start the engine is currently rendering.
struct DaspAdapter {
    node: Box<dyn ErasedNode>,
    sample_rate: u32,
    buffer_size: usize,
    clock: Arc<AtomicU64>,
}

impl dasp_graph::Node for DaspAdapter {
    fn process(&mut self, inputs: &[Input], outputs: &mut [Buffer]) {
        let ctx = ProcessContext {
            sample_rate: self.sample_rate,
            buffer_size: self.buffer_size,
            block_start: self.clock.load(Ordering::Relaxed),
        };
        self.node.process_erased(&ctx, inputs, outputs);
    }
}

type InnerGraph = StableGraph<NodeData<DaspAdapter>, ()>;

/// An audio processing graph at a fixed sample rate.
pub(crate) struct Engine {
    graph: InnerGraph,
    processor: Processor<InnerGraph>,
    sample_rate: u32,

    node_indices: HashMap<NodeId, NodeIndex>,
    next_node_id: u32,

    /// Frames rendered so far; the graph clock.
    clock: Arc<AtomicU64>,

    terminal: Option<NodeIndex>,
}

impl Engine {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            graph: InnerGraph::with_capacity(64, 64),
            processor: Processor::with_capacity(64),
            sample_rate,
            node_indices: HashMap::new(),
            next_node_id: 0,
            clock: Arc::new(AtomicU64::new(0)),
            terminal: None,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames rendered so far.
    pub fn frames_rendered(&self) -> u64 {
        self.clock.load(Ordering::Relaxed)
    }

    /// Add a node, returns a handle for sending messages
    pub fn add<N: GraphNode>(&mut self, node: N) -> NodeHandle<N::Message> {
        self.add_with_queue_size(node, 64)
    }

    pub fn add_with_queue_size<N: GraphNode>(
        &mut self,
        node: N,
        queue_size: usize,
    ) -> NodeHandle<N::Message> {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;

        let (producer, consumer) = RingBuffer::new(queue_size);

        let num_outputs = node.num_outputs();
        let wrapper = NodeWrapper {
            node,
            receiver: consumer,
        };
        let adapter = DaspAdapter {
            node: Box::new(wrapper),
            sample_rate: self.sample_rate,
            buffer_size: BLOCK_FRAMES as usize,
            clock: Arc::clone(&self.clock),
        };

        let node_data = match num_outputs {
            2 => NodeData::new2(adapter),
            // 0 outputs = sink, but dasp_graph still needs a buffer for inputs
            _ => NodeData::new1(adapter),
        };

        let idx = self.graph.add_node(node_data);
        self.node_indices.insert(id, idx);

        NodeHandle {
            id,
            sender: producer,
            _marker: PhantomData,
        }
    }

    /// Connect output of `from` to input of `to`. Duplicate edges are not
    /// added.
    pub fn connect(&mut self, from: NodeId, to: NodeId) {
        let (Some(&from_idx), Some(&to_idx)) =
            (self.node_indices.get(&from), self.node_indices.get(&to))
        else {
            return;
        };
        if self.graph.find_edge(from_idx, to_idx).is_none() {
            self.graph.add_edge(from_idx, to_idx, ());
        }
    }

    /// Remove every outgoing edge of a node. Idempotent.
    pub fn disconnect(&mut self, from: NodeId) {
        let Some(&from_idx) = self.node_indices.get(&from) else {
            return;
        };
        let outgoing: Vec<_> = self
            .graph
            .neighbors_directed(from_idx, petgraph::Direction::Outgoing)
            .collect();
        for to_idx in outgoing {
            if let Some(edge) = self.graph.find_edge(from_idx, to_idx) {
                self.graph.remove_edge(edge);
            }
        }
    }

    /// Remove a node entirely, edges included. The id is dead afterwards.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(idx) = self.node_indices.remove(&id) {
            self.graph.remove_node(idx);
        }
    }

    /// Set which node to process to (typically a sink)
    pub fn set_terminal(&mut self, id: NodeId) {
        self.terminal = self.node_indices.get(&id).copied();
    }

    /// Process one block of audio through the graph and advance the clock.
    pub fn process_block(&mut self) {
        if let Some(terminal) = self.terminal {
            self.processor.process(&mut self.graph, terminal);
        }
        self.clock.fetch_add(BLOCK_FRAMES, Ordering::Relaxed);
    }
}
