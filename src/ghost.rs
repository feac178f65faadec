use crate::boundary::BoundaryId;
use crate::field::{BoundaryView, FieldView, WholeFieldView};
use crate::stepper::{BoundaryStepper, FieldGeometry, WholeFieldStepper};




/**
 * Off-block storage for one face of a block: a `width`-deep slab with the
 * block's extent in every other dimension, holding the neighbor values the
 * stencil needs past that face.
 *
 * Incoming data is written to a separate landing buffer so a transport can
 * deposit a message while the readable values from the previous cycle are
 * still in use; [`fetch_landed_values`](Self::fetch_landed_values) publishes
 * the landing buffer once the arrival is acknowledged.
 */
pub struct GhostRegion<const D: usize> {
    boundary: BoundaryId,
    width: usize,
    geometry: FieldGeometry<D>,
    values: Vec<f64>,
    landing: Vec<f64>,
}




impl<const D: usize> GhostRegion<D> {


    /**
     * A zero-filled ghost region for the given face of a block that is
     * `elements_per_dim` wide in every dimension.
     */
    pub fn new(boundary: BoundaryId, elements_per_dim: usize, width: usize) -> Self {
        assert!(boundary.dimension() < D);
        assert!(width <= elements_per_dim);
        let mut sizes = [elements_per_dim; D];
        sizes[boundary.dimension()] = width;
        let geometry = FieldGeometry::new(sizes);
        let total = geometry.total();
        Self {
            boundary,
            width,
            geometry,
            values: vec![0.0; total],
            landing: vec![0.0; total],
        }
    }


    pub fn boundary(&self) -> BoundaryId {
        self.boundary
    }


    pub fn width(&self) -> usize {
        self.width
    }


    pub fn geometry(&self) -> &FieldGeometry<D> {
        &self.geometry
    }


    /// Tag under which this region's data arrives from the neighbor.
    pub fn receive_tag(&self) -> u16 {
        self.boundary.receive_tag()
    }


    pub fn values(&self) -> &[f64] {
        &self.values
    }


    /**
     * Deposit an arrived slab into the landing buffer. The payload must hold
     * exactly this region's element count, in the region's own lexicographic
     * storage order.
     */
    pub fn land(&mut self, payload: Vec<f64>) {
        assert_eq!(
            payload.len(),
            self.landing.len(),
            "ghost slab for face {:?} has the wrong element count",
            self.boundary
        );
        self.landing = payload;
    }


    /**
     * Publish the landing buffer as the readable values.
     */
    pub fn fetch_landed_values(&mut self) {
        self.values.copy_from_slice(&self.landing);
    }


    /// Walk every element of the region.
    pub fn inner_view(&self) -> WholeFieldView<'_, D> {
        FieldView::new(WholeFieldStepper::new(self.geometry), self.values.as_slice())
    }


    /// Walk one face of the region for the given task share.
    pub fn boundary_view(&self, task_id: usize, num_tasks: usize) -> BoundaryView<'_, D> {
        FieldView::new(
            BoundaryStepper::task(self.geometry, task_id, num_tasks),
            self.values.as_slice(),
        )
    }


    /// Mutable face walk, for in-process neighbors that copy straight in.
    pub fn boundary_view_mut(&mut self) -> FieldView<BoundaryStepper<D>, &mut [f64]> {
        FieldView::new(
            BoundaryStepper::new(self.geometry),
            self.values.as_mut_slice(),
        )
    }
}
