use im_rc::{OrdSet, Vector};
use log::debug;
use serde::Serialize;

use crate::runtime::{
    data_type::DataType,
    error::EvalError,
    gc::{Identifier, heap_node::HeapNode, heap_object::HeapData},
};

const DEFAULT_GC_THRESHOLD: usize = 1024;
const MIN_GC_THRESHOLD: usize = 16;

/// Counters describing the heap at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeapStats {
    pub capacity: usize,
    pub live: usize,
    pub recycled: usize,
    pub total_allocations: usize,
    pub total_collections: usize,
    pub total_frees: usize,
}

/// Reference-counted, dependency-tracked node store.
///
/// Nodes are addressed by [`Identifier`]. Freed slots go to a recycle queue
/// and are handed out again before the store grows. Increments are applied
/// immediately; decrements are queued and applied by [`Heap::reconcile`] so
/// that a value popped and re-pushed within one step never hits zero.
///
/// Storage is persistent: cloning a heap is O(1) and later writes copy only
/// the touched paths.
#[derive(Clone)]
pub struct Heap<F> {
    nodes: Vector<HeapNode<F>>,
    recycle_queue: Vector<Identifier>,
    pending_decrements: Vec<Identifier>,
    allocation_count: usize,
    gc_threshold: usize,
    gc_enabled: bool,
    total_allocations: usize,
    total_collections: usize,
    total_frees: usize,
}

impl<F: Clone> Default for Heap<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Clone> Heap<F> {
    pub fn new() -> Self {
        Self {
            nodes: Vector::new(),
            recycle_queue: Vector::new(),
            pending_decrements: Vec::new(),
            allocation_count: 0,
            gc_threshold: DEFAULT_GC_THRESHOLD,
            gc_enabled: true,
            total_allocations: 0,
            total_collections: 0,
            total_frees: 0,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.gc_enabled = enabled;
    }

    /// Values below `MIN_GC_THRESHOLD` are clamped upward.
    pub fn set_threshold(&mut self, threshold: usize) {
        self.gc_threshold = threshold.max(MIN_GC_THRESHOLD);
    }

    /// Returns `true` when collection is enabled and enough allocations
    /// happened since the last mark-and-sweep.
    pub fn should_collect(&self) -> bool {
        self.gc_enabled && self.allocation_count >= self.gc_threshold
    }

    /// Number of slots, live or free.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn live_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_assigned()).count()
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            capacity: self.capacity(),
            live: self.live_count(),
            recycled: self.recycle_queue.len(),
            total_allocations: self.total_allocations,
            total_collections: self.total_collections,
            total_frees: self.total_frees,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Identifier, &HeapNode<F>)> {
        // Every slot was numbered by `alloc`, so each index fits.
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| Some((Identifier::from_index(index).ok()?, node)))
    }

    /// Stores `data` in a recycled slot if one is available, else appends.
    /// The new node has no dependencies and a reference count of zero.
    /// Fails only when a new slot would fall outside the identifier range.
    pub fn alloc(&mut self, data: HeapData<F>) -> Result<Identifier, EvalError> {
        let node = HeapNode::new(data);
        let id = match self.recycle_queue.pop_back() {
            Some(id) => {
                self.nodes.set(id.index(), node);
                id
            }
            None => {
                let id = Identifier::from_index(self.nodes.len())?;
                self.nodes.push_back(node);
                id
            }
        };
        self.allocation_count += 1;
        self.total_allocations += 1;
        Ok(id)
    }

    pub fn node(&self, id: Identifier) -> Result<&HeapNode<F>, EvalError> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| EvalError::internal(format!("invalid identifier {}", id)))
    }

    fn node_mut(&mut self, id: Identifier) -> Result<&mut HeapNode<F>, EvalError> {
        self.nodes
            .get_mut(id.index())
            .ok_or_else(|| EvalError::internal(format!("invalid identifier {}", id)))
    }

    fn live_node_mut(&mut self, id: Identifier) -> Result<&mut HeapNode<F>, EvalError> {
        let node = self.node_mut(id)?;
        if !node.is_assigned() {
            return Err(EvalError::internal(format!("{} is not assigned", id)));
        }
        Ok(node)
    }

    /// Returns the payload of a live node.
    pub fn get(&self, id: Identifier) -> Result<&HeapData<F>, EvalError> {
        self.node(id)?
            .data
            .as_ref()
            .ok_or_else(|| EvalError::internal(format!("{} is not assigned", id)))
    }

    pub fn get_mut(&mut self, id: Identifier) -> Result<&mut HeapData<F>, EvalError> {
        self.node_mut(id)?
            .data
            .as_mut()
            .ok_or_else(|| EvalError::internal(format!("{} is not assigned", id)))
    }

    pub fn data_type(&self, id: Identifier) -> Result<DataType, EvalError> {
        Ok(self.get(id)?.data_type())
    }

    pub fn ref_count(&self, id: Identifier) -> Result<usize, EvalError> {
        Ok(self.node(id)?.ref_count)
    }

    /// Records that `dependent` keeps `dependee` alive. Idempotent.
    pub fn tie(&mut self, dependent: Identifier, dependee: Option<Identifier>) -> Result<(), EvalError> {
        let Some(dependee) = dependee else {
            return Ok(());
        };
        self.get(dependee)?;
        let node = self.live_node_mut(dependent)?;
        if node.dependencies.contains(&dependee) {
            return Ok(());
        }
        node.dependencies.insert(dependee);
        self.increment_ref(dependee)
    }

    /// Removes the edge added by [`Heap::tie`]. The decrement is deferred.
    pub fn untie(&mut self, dependent: Identifier, dependee: Option<Identifier>) -> Result<(), EvalError> {
        let Some(dependee) = dependee else {
            return Ok(());
        };
        let node = self.live_node_mut(dependent)?;
        if node.dependencies.remove(&dependee).is_none() {
            return Ok(());
        }
        self.decrement_ref(dependee)
    }

    pub fn increment_ref(&mut self, id: Identifier) -> Result<(), EvalError> {
        self.live_node_mut(id)?.ref_count += 1;
        Ok(())
    }

    /// Queues a decrement to be applied by the next [`Heap::reconcile`].
    pub fn decrement_ref(&mut self, id: Identifier) -> Result<(), EvalError> {
        self.live_node_mut(id)?;
        self.pending_decrements.push(id);
        Ok(())
    }

    pub fn pending_decrements(&self) -> &[Identifier] {
        &self.pending_decrements
    }

    /// Applies every queued decrement exactly once.
    pub fn reconcile(&mut self) -> Result<(), EvalError> {
        let pending = std::mem::take(&mut self.pending_decrements);
        for id in pending {
            let node = self.live_node_mut(id)?;
            node.ref_count = node
                .ref_count
                .checked_sub(1)
                .ok_or_else(|| EvalError::internal(format!("reference count underflow at {}", id)))?;
        }
        Ok(())
    }

    fn free_slot(&mut self, id: Identifier) -> Result<OrdSet<Identifier>, EvalError> {
        let node = self.node_mut(id)?;
        let dependencies = std::mem::take(&mut node.dependencies);
        *node = HeapNode::free();
        self.recycle_queue.push_back(id);
        self.total_frees += 1;
        Ok(dependencies)
    }

    /// Frees nodes whose count is zero, cascading through their dependencies.
    ///
    /// With `targets`, only those nodes (and whatever their release drops to
    /// zero) are considered. Returns the number of freed nodes.
    pub fn clean(&mut self, targets: Option<&[Identifier]>) -> Result<usize, EvalError> {
        let mut worklist: Vec<Identifier> = match targets {
            Some(targets) => targets.to_vec(),
            None => self
                .iter()
                .filter(|(_, node)| node.is_assigned() && node.ref_count == 0)
                .map(|(id, _)| id)
                .collect(),
        };

        let mut freed = 0;
        while let Some(id) = worklist.pop() {
            let node = self.node(id)?;
            if id.is_permanent() || !node.is_assigned() || node.ref_count > 0 {
                continue;
            }
            let dependencies = self.free_slot(id)?;
            freed += 1;
            for dependency in dependencies {
                let dep = self.live_node_mut(dependency)?;
                dep.ref_count = dep.ref_count.checked_sub(1).ok_or_else(|| {
                    EvalError::internal(format!("reference count underflow at {}", dependency))
                })?;
                if dep.ref_count == 0 {
                    worklist.push(dependency);
                }
            }
        }

        self.total_collections += 1;
        if freed > 0 {
            debug!("clean freed {} node(s)", freed);
        }
        Ok(freed)
    }

    /// Frees every node unreachable from the roots, cycles included, then
    /// recomputes every live count from scratch.
    ///
    /// `counted_roots` are the machine's own references (Control refs, Stash
    /// entries, the current frame) with multiplicity. `extra_roots` only
    /// protect nodes from being swept. The permanent frames are always roots.
    /// Queued decrements are discarded: the recount supersedes them.
    pub fn mark_sweep(
        &mut self,
        counted_roots: &[Identifier],
        extra_roots: &[Identifier],
    ) -> Result<usize, EvalError> {
        let marked = self.mark(
            counted_roots
                .iter()
                .chain(extra_roots)
                .copied()
                .chain([Identifier::GLOBAL, Identifier::PROGRAM]),
        )?;

        let mut freed = 0;
        for index in 0..self.nodes.len() {
            let id = Identifier::from_index(index)?;
            if !marked[index] && !id.is_permanent() && self.nodes[index].is_assigned() {
                self.free_slot(id)?;
                freed += 1;
            }
        }

        self.pending_decrements.clear();
        self.recount(counted_roots)?;
        self.total_collections += 1;
        self.allocation_count = 0;
        debug!(
            "mark-sweep freed {} node(s), {} live",
            freed,
            self.live_count()
        );
        Ok(freed)
    }

    fn mark(&self, roots: impl Iterator<Item = Identifier>) -> Result<Vec<bool>, EvalError> {
        let mut marked = vec![false; self.nodes.len()];
        let mut worklist: Vec<Identifier> = Vec::with_capacity(16);
        for root in roots {
            self.node(root)?;
            worklist.push(root);
        }

        while let Some(id) = worklist.pop() {
            let index = id.index();
            let node = self.node(id)?;
            // Mark first so cycles and shared nodes are visited once.
            if marked[index] || !node.is_assigned() {
                continue;
            }
            marked[index] = true;
            worklist.extend(node.dependencies.iter().copied());
        }
        Ok(marked)
    }

    /// Reference counts implied by the roots and the dependency graph.
    pub fn expected_ref_counts(&self, counted_roots: &[Identifier]) -> Result<Vec<usize>, EvalError> {
        let mut counts = vec![0usize; self.nodes.len()];
        for root in counted_roots {
            self.node(*root)?;
            counts[root.index()] += 1;
        }
        for (_, node) in self.iter() {
            for dependency in node.dependencies.iter() {
                self.node(*dependency)?;
                counts[dependency.index()] += 1;
            }
        }
        Ok(counts)
    }

    fn recount(&mut self, counted_roots: &[Identifier]) -> Result<(), EvalError> {
        let counts = self.expected_ref_counts(counted_roots)?;
        for (index, count) in counts.into_iter().enumerate() {
            if let Some(node) = self.nodes.get_mut(index) {
                if node.is_assigned() {
                    node.ref_count = count;
                }
            }
        }
        Ok(())
    }

    /// Fails on the first node whose stored count disagrees with the count
    /// implied by the roots and the dependency graph.
    pub fn verify_ref_counts(&self, counted_roots: &[Identifier]) -> Result<(), EvalError> {
        let counts = self.expected_ref_counts(counted_roots)?;
        for (id, node) in self.iter() {
            let expected = counts[id.index()];
            if node.is_assigned() && node.ref_count != expected {
                return Err(EvalError::internal(format!(
                    "reference count mismatch at {}: stored {}, expected {}",
                    id, node.ref_count, expected
                )));
            }
        }
        Ok(())
    }

    /// Fails on the first node whose dependency set differs from what its
    /// payload refers to.
    pub fn verify_dependencies(&self) -> Result<(), EvalError> {
        for (id, node) in self.iter() {
            if let Some(data) = &node.data {
                if data.references() != node.dependencies {
                    return Err(EvalError::internal(format!(
                        "dependency mismatch at {}",
                        id
                    )));
                }
            }
        }
        Ok(())
    }
}
