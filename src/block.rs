use crate::boundary::BoundaryId;
use crate::composed::ComposedBoundaryView;
use crate::field::{BoundaryAccess, BoundaryView, FieldAccess, FieldAccessMut, FieldView};
use crate::ghost::GhostRegion;
use crate::stepper::{BoundaryStepper, FieldGeometry, WholeFieldStepper};
use crate::timer::Timer;
use crate::transport::{CartTopology, Communicator, Message};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;


/// A shareable handle to a block's interior value buffer. An empty buffer
/// means the values have not been set yet.
pub type ValuesHandle = Arc<RwLock<Vec<f64>>>;


/// A read view over a task's share of a block interior.
pub type InnerBlockView<'a, const D: usize> =
    FieldView<WholeFieldStepper<D>, RwLockReadGuard<'a, Vec<f64>>>;

/// A read view over a task's share of one interior face.
pub type BlockBoundaryView<'a, const D: usize> =
    FieldView<BoundaryStepper<D>, RwLockReadGuard<'a, Vec<f64>>>;

/// The stitched interior+ghost view a stencil's boundary phase reads.
pub type ComposedBlockView<'a, const D: usize> =
    ComposedBoundaryView<D, BlockBoundaryView<'a, D>, BoundaryView<'a, D>>;




/**
 * The geometry, interior storage and ghost regions of one block, shared by
 * every exchange strategy. Interiors live behind an `Arc<RwLock>` so an
 * in-process neighbor can hold a reading handle to another block's buffer.
 */
pub struct BlockCore<const D: usize> {
    elements_per_dim: usize,
    ghost_width: usize,
    geometry: FieldGeometry<D>,
    interior: ValuesHandle,
    ghosts: Option<[[GhostRegion<D>; 2]; D]>,
}




impl<const D: usize> BlockCore<D> {

    fn new(elements_per_dim: usize, ghost_width: usize, with_ghosts: bool) -> Self {
        assert!(elements_per_dim > 0);
        let geometry = FieldGeometry::new([elements_per_dim; D]);
        let ghosts = if with_ghosts {
            assert!(ghost_width > 0 && ghost_width <= elements_per_dim);
            Some(std::array::from_fn(|d| {
                [
                    GhostRegion::new(BoundaryId::new(d, true), elements_per_dim, ghost_width),
                    GhostRegion::new(BoundaryId::new(d, false), elements_per_dim, ghost_width),
                ]
            }))
        } else {
            None
        };
        Self {
            elements_per_dim,
            ghost_width,
            geometry,
            interior: Arc::new(RwLock::new(Vec::new())),
            ghosts,
        }
    }

    pub fn ghost(&self, face: BoundaryId) -> &GhostRegion<D> {
        let ghosts = self.ghosts.as_ref().expect("block has no ghost regions");
        &ghosts[face.dimension()][side_slot(face)]
    }

    pub fn ghost_mut(&mut self, face: BoundaryId) -> &mut GhostRegion<D> {
        let ghosts = self.ghosts.as_mut().expect("block has no ghost regions");
        &mut ghosts[face.dimension()][side_slot(face)]
    }
}


fn side_slot(face: BoundaryId) -> usize {
    if face.is_lower_side() {
        0
    } else {
        1
    }
}




/**
 * How a block gets its ghost regions filled. `start_exchange` posts all
 * 2 * D outgoing face slabs without blocking on their delivery;
 * `wait_next_received` blocks for the next not-yet-delivered incoming face
 * of the current cycle, in whatever order they arrive, and returns each face
 * exactly once per cycle; `finish_sends` blocks until the outgoing buffers
 * may be reused.
 */
pub trait GhostExchange<const D: usize> {
    fn start_exchange(&mut self, core: &mut BlockCore<D>);
    fn wait_next_received(&mut self, core: &mut BlockCore<D>) -> BoundaryId;
    fn finish_sends(&mut self);
}




/**
 * A block of an N-dimensional grid: a cubical interior of `elements_per_dim`
 * points per dimension, plus one ghost region per face unless the block is
 * built with [`Block::pure`]. The exchange strategy `E` decides where ghost
 * data comes from.
 */
pub struct Block<const D: usize, E> {
    core: BlockCore<D>,
    exchange: E,
    comm_timer: Timer,
}




impl<const D: usize, E> Block<D, E> {


    pub fn elements_per_dim(&self) -> usize {
        self.core.elements_per_dim
    }


    pub fn ghost_width(&self) -> usize {
        self.core.ghost_width
    }


    pub fn geometry(&self) -> &FieldGeometry<D> {
        &self.core.geometry
    }


    /**
     * A cloneable handle to this block's interior buffer, for wiring it up
     * as another in-process block's neighbor.
     */
    pub fn values_handle(&self) -> ValuesHandle {
        self.core.interior.clone()
    }


    /**
     * Install the interior values. The buffer must hold exactly one value
     * per interior point, in lexicographic order.
     */
    pub fn set_values(&self, values: Vec<f64>) {
        assert_eq!(values.len(), self.core.geometry.total());
        *self.core.interior.write().unwrap() = values;
    }


    /// Read access to the interior buffer. Views borrowing a plain slice of
    /// this are what gets handed across worker threads; the guard itself
    /// stays on the calling thread.
    pub fn values_read(&self) -> RwLockReadGuard<'_, Vec<f64>> {
        self.core.interior.read().unwrap()
    }


    /// Write access to the interior buffer, also used to swap two blocks'
    /// contents between time steps.
    pub fn values_mut(&self) -> RwLockWriteGuard<'_, Vec<f64>> {
        self.core.interior.write().unwrap()
    }


    pub fn ghost(&self, face: BoundaryId) -> &GhostRegion<D> {
        self.core.ghost(face)
    }


    /// Walk this task's share of the interior.
    pub fn inner_view(&self, task_id: usize, num_tasks: usize) -> InnerBlockView<'_, D> {
        let guard = self.core.interior.read().unwrap();
        assert!(!guard.is_empty(), "block values not set");
        FieldView::new(
            WholeFieldStepper::task(self.core.geometry, task_id, num_tasks),
            guard,
        )
    }


    /// Walk this task's share of one interior face; aim it with
    /// `set_boundary_to_iterate`.
    pub fn boundary_view(&self, task_id: usize, num_tasks: usize) -> BlockBoundaryView<'_, D> {
        let guard = self.core.interior.read().unwrap();
        assert!(!guard.is_empty(), "block values not set");
        FieldView::new(
            BoundaryStepper::task(self.core.geometry, task_id, num_tasks),
            guard,
        )
    }


    /**
     * The interior face walk stitched together with all 2 * D ghost regions,
     * so neighbor offsets that leave the interior read ghost data. Each
     * ghost's face walk carries the same task share as the interior walk,
     * which keeps the two in lockstep for any face this view is aimed at.
     */
    pub fn composed_boundary_view(
        &self,
        task_id: usize,
        num_tasks: usize,
    ) -> ComposedBlockView<'_, D> {
        let ghosts = self.core.ghosts.as_ref().expect("block has no ghost regions");
        let main = self.boundary_view(task_id, num_tasks);
        let sides = std::array::from_fn(|d| {
            [
                ghosts[d][0].boundary_view(task_id, num_tasks),
                ghosts[d][1].boundary_view(task_id, num_tasks),
            ]
        });
        ComposedBoundaryView::new(main, sides, BoundaryId::first())
    }
}




impl<const D: usize, E: GhostExchange<D>> Block<D, E> {


    /**
     * Post this cycle's outgoing face slabs. Does not block on delivery.
     */
    pub fn start_exchange(&mut self) {
        self.comm_timer.start();
        self.exchange.start_exchange(&mut self.core);
        self.comm_timer.stop();
    }


    /**
     * Block until another face of the current cycle has its ghost data in
     * place, and return which one. Faces come back in arrival order, each
     * exactly once per cycle.
     */
    pub fn wait_next_received(&mut self) -> BoundaryId {
        self.comm_timer.start();
        let face = self.exchange.wait_next_received(&mut self.core);
        self.comm_timer.stop();
        face
    }


    /**
     * Block until the buffers posted by `start_exchange` may be reused.
     */
    pub fn finish_sends(&mut self) {
        self.comm_timer.start();
        self.exchange.finish_sends();
        self.comm_timer.stop();
    }


    /// Total time spent in the three exchange calls so far.
    pub fn communication_time(&self) -> Duration {
        self.comm_timer.total()
    }


    pub fn reset_communication_time(&mut self) {
        self.comm_timer.reset();
    }
}




/// Exchange strategy of a pure block: there are no ghost regions, so there
/// is nothing to exchange and the exchange methods do not exist.
pub struct NoExchange;


impl<const D: usize> Block<D, NoExchange> {

    /// A block with no ghost regions, usable as a stencil result.
    pub fn pure(elements_per_dim: usize) -> Self {
        Self {
            core: BlockCore::new(elements_per_dim, 0, false),
            exchange: NoExchange,
            comm_timer: Timer::new(),
        }
    }
}




/**
 * In-process exchange: each face is wired to a neighbor block's interior
 * buffer, and `start_exchange` copies the neighbor's boundary slab straight
 * into this block's ghost region. Every face starts out wired to the block's
 * own interior, which makes an unwired block periodic on its own.
 */
pub struct DirectExchange<const D: usize> {
    neighbors: [[ValuesHandle; 2]; D],
    pending: Option<BoundaryId>,
}




impl<const D: usize> Block<D, DirectExchange<D>> {


    /// A block whose ghost regions are filled by in-process copies,
    /// initially from its own opposite faces.
    pub fn composed(elements_per_dim: usize, ghost_width: usize) -> Self {
        let core = BlockCore::new(elements_per_dim, ghost_width, true);
        let neighbors = std::array::from_fn(|_| [core.interior.clone(), core.interior.clone()]);
        Self {
            core,
            exchange: DirectExchange {
                neighbors,
                pending: None,
            },
            comm_timer: Timer::new(),
        }
    }


    /**
     * Wire the given face to a neighbor block's interior. The neighbor must
     * have the same elements per dimension as this block.
     */
    pub fn set_neighbor(&mut self, face: BoundaryId, neighbor: ValuesHandle) {
        self.exchange.neighbors[face.dimension()][side_slot(face)] = neighbor;
    }
}




impl<const D: usize> GhostExchange<D> for DirectExchange<D> {

    fn start_exchange(&mut self, core: &mut BlockCore<D>) {
        let geometry = core.geometry;
        let ghosts = core.ghosts.as_mut().expect("block has no ghost regions");
        for d in 0..D {
            for (slot, lower) in [(0usize, true), (1, false)] {
                let face = BoundaryId::new(d, lower);
                let handle = self.neighbors[d][slot].clone();
                let neighbor = handle.read().unwrap();
                assert!(!neighbor.is_empty(), "neighbor block values not set");
                assert_eq!(neighbor.len(), geometry.total());
                fill_ghost_from(&mut ghosts[d][slot], face, &neighbor, geometry);
            }
        }
        self.pending = Some(BoundaryId::first());
    }

    fn wait_next_received(&mut self, _core: &mut BlockCore<D>) -> BoundaryId {
        let face = self.pending.expect("no exchange cycle in progress");
        let mut next = face;
        next.step();
        self.pending = if next.dimension() < D { Some(next) } else { None };
        face
    }

    fn finish_sends(&mut self) {}
}


/// Copy the neighbor's `width`-deep slab behind `face` into the ghost
/// region, walking the two adjacent faces in lockstep and stepping inward:
/// for a lower face the relevant slab is the top of the neighbor below, so
/// both walks run on the upper faces and the inward offsets are negative.
fn fill_ghost_from<const D: usize>(
    ghost: &mut GhostRegion<D>,
    face: BoundaryId,
    neighbor_values: &[f64],
    neighbor_geometry: FieldGeometry<D>,
) {
    let d = face.dimension();
    let direction: isize = if face.is_lower_side() { -1 } else { 1 };
    let width = ghost.width();

    let mut source = FieldView::new(BoundaryStepper::new(neighbor_geometry), neighbor_values);
    source.set_boundary_to_iterate(face.opposite());
    let mut target = ghost.boundary_view_mut();
    target.set_boundary_to_iterate(face.opposite());

    while source.is_in_field() {
        for i in 0..width as isize {
            target.set_current_neighbor(d, i * direction, source.current_neighbor(d, i * direction));
        }
        source.next();
        target.next();
    }
}




/**
 * Message-passing exchange over a [`Communicator`], with the ranks arranged
 * in a periodic Cartesian grid. Face slabs go out as tagged non-blocking
 * sends; receives complete in arrival order, and a message for a face that
 * already completed this cycle (a fast neighbor running ahead) is stashed
 * for the next cycle instead of being dropped.
 */
pub struct TransportExchange<const D: usize, C> {
    comm: C,
    topology: CartTopology<D>,
    pending: [[bool; 2]; D],
    stash: Vec<Message>,
}




impl<const D: usize, C: Communicator> Block<D, TransportExchange<D, C>> {


    /// A block whose ghost regions are exchanged with the neighboring ranks
    /// of `comm`, under the balanced periodic topology for its size.
    pub fn with_transport(elements_per_dim: usize, ghost_width: usize, comm: C) -> Self {
        let topology = CartTopology::new(comm.rank(), comm.size());
        Self {
            core: BlockCore::new(elements_per_dim, ghost_width, true),
            exchange: TransportExchange {
                comm,
                topology,
                pending: [[false; 2]; D],
                stash: Vec::new(),
            },
            comm_timer: Timer::new(),
        }
    }


    pub fn topology(&self) -> &CartTopology<D> {
        &self.exchange.topology
    }


    pub fn communicator(&self) -> &C {
        &self.exchange.comm
    }
}




impl<const D: usize, C: Communicator> GhostExchange<D> for TransportExchange<D, C> {

    fn start_exchange(&mut self, core: &mut BlockCore<D>) {
        let width = core.ghost_width;
        let interior = core.interior.read().unwrap();
        assert!(!interior.is_empty(), "block values not set");

        for d in 0..D {
            self.pending[d] = [true, true];
            // The slab behind our lower face goes to the neighbor below,
            // where it fills their upper ghost, and symmetrically above. The
            // tag says which side of the sender the slab came from.
            let below = gather_slab(&interior, &core.geometry, d, true, width);
            self.comm.send(self.topology.neighbor(d, false), (2 * d) as u16, below);
            let above = gather_slab(&interior, &core.geometry, d, false, width);
            self.comm.send(self.topology.neighbor(d, true), (2 * d + 1) as u16, above);
        }
    }

    fn wait_next_received(&mut self, core: &mut BlockCore<D>) -> BoundaryId {
        loop {
            let stashed = self.stash.iter().position(|message| {
                let face = BoundaryId::from_receive_tag(message.tag);
                self.pending[face.dimension()][side_slot(face)]
            });
            let message = match stashed {
                Some(at) => self.stash.remove(at),
                None => self.comm.recv_any(),
            };

            let face = BoundaryId::from_receive_tag(message.tag);
            assert!(face.dimension() < D, "unexpected tag {} during exchange", message.tag);
            if self.pending[face.dimension()][side_slot(face)] {
                self.pending[face.dimension()][side_slot(face)] = false;
                let ghost = core.ghost_mut(face);
                ghost.land(message.values);
                ghost.fetch_landed_values();
                return face;
            }
            // Already delivered this cycle; this one belongs to the next.
            log::debug!(
                "stashing early tag {} message from rank {}",
                message.tag,
                message.source
            );
            self.stash.push(message);
        }
    }

    fn finish_sends(&mut self) {
        // Sends hand their buffers to the transport by value, so there is
        // nothing left to wait for.
    }
}


/// Collect the `width`-deep slab of interior values behind the lower or
/// upper face along `dimension`, in the slab's own lexicographic order,
/// which is also the storage order of the ghost region it will land in.
fn gather_slab<const D: usize>(
    values: &[f64],
    geometry: &FieldGeometry<D>,
    dimension: usize,
    lower: bool,
    width: usize,
) -> Vec<f64> {
    let stride = geometry.stride(dimension);
    let next_stride = geometry.stride(dimension + 1);
    let extent = geometry.size(dimension);
    let chunks = geometry.total() / next_stride;
    let first_layer = if lower { 0 } else { extent - width };

    let mut slab = Vec::with_capacity(chunks * width * stride);
    for chunk in 0..chunks {
        for layer in first_layer..first_layer + width {
            let start = chunk * next_stride + layer * stride;
            slab.extend_from_slice(&values[start..start + stride]);
        }
    }
    slab
}
