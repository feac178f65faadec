use crate::boundary::BoundaryId;
use crate::stepper::{BoundaryStepper, Stepper, WholeFieldStepper};
use std::sync::{RwLockReadGuard, RwLockWriteGuard};




/**
 * Read access to a flat buffer of grid values. A view pairs one of these
 * with a stepper; the stepper turns coordinates into linear indices and the
 * accessor turns linear indices into values.
 */
pub trait ValueGet {
    fn value(&self, index: usize) -> f64;
}


/**
 * Write access on top of [`ValueGet`].
 */
pub trait ValueSet: ValueGet {
    fn set_value(&mut self, index: usize, value: f64);
}


impl ValueGet for &[f64] {
    #[inline]
    fn value(&self, index: usize) -> f64 {
        self[index]
    }
}

impl ValueGet for &mut [f64] {
    #[inline]
    fn value(&self, index: usize) -> f64 {
        self[index]
    }
}

impl ValueSet for &mut [f64] {
    #[inline]
    fn set_value(&mut self, index: usize, value: f64) {
        self[index] = value;
    }
}

impl<'a> ValueGet for RwLockReadGuard<'a, Vec<f64>> {
    #[inline]
    fn value(&self, index: usize) -> f64 {
        self[index]
    }
}

impl<'a> ValueGet for RwLockWriteGuard<'a, Vec<f64>> {
    #[inline]
    fn value(&self, index: usize) -> f64 {
        self[index]
    }
}

impl<'a> ValueSet for RwLockWriteGuard<'a, Vec<f64>> {
    #[inline]
    fn set_value(&mut self, index: usize, value: f64) {
        self[index] = value;
    }
}




/**
 * A copyable raw view of a mutable value buffer, for handing one result
 * buffer to every worker of a task team at once.
 *
 * Safety rests on the executor's partitioning contract: each task walks a
 * disjoint index range, so no element is written by two workers, and
 * `execute` does not return until every worker has finished, so no access
 * outlives the buffer borrow this was created from.
 */
#[derive(Clone, Copy)]
pub struct SharedSlice {
    ptr: *mut f64,
    len: usize,
}

unsafe impl Send for SharedSlice {}
unsafe impl Sync for SharedSlice {}

impl SharedSlice {
    pub fn new(values: &mut [f64]) -> Self {
        Self {
            ptr: values.as_mut_ptr(),
            len: values.len(),
        }
    }
}

impl ValueGet for SharedSlice {
    #[inline]
    fn value(&self, index: usize) -> f64 {
        assert!(index < self.len);
        unsafe { *self.ptr.add(index) }
    }
}

impl ValueSet for SharedSlice {
    #[inline]
    fn set_value(&mut self, index: usize, value: f64) {
        assert!(index < self.len);
        unsafe { *self.ptr.add(index) = value }
    }
}




/**
 * The cursor-style element walk every stencil loop is written against:
 * advance with `first`/`next`/`is_in_field`, read the current element and
 * its neighbors by (dimension, offset). Implemented by plain views and by
 * the composed interior+ghost view, so boundary loops cannot tell whether a
 * neighbor lives in the interior or in a ghost region.
 */
pub trait FieldAccess<const D: usize> {
    fn first(&mut self);
    fn next(&mut self);
    fn is_in_field(&self) -> bool;

    /// The `dimension`-th coordinate of the current element.
    fn current_index(&self, dimension: usize) -> usize;

    fn current_value(&self) -> f64;

    /// Value of the element `offset` steps away along `dimension`.
    fn current_neighbor(&self, dimension: usize, offset: isize) -> f64;

    fn size(&self, dimension: usize) -> usize;
}


/**
 * Write half of [`FieldAccess`].
 */
pub trait FieldAccessMut<const D: usize>: FieldAccess<D> {
    fn set_current_value(&mut self, value: f64);
    fn set_current_neighbor(&mut self, dimension: usize, offset: isize, value: f64);
}


/**
 * A face-targetable [`FieldAccess`]: re-aim the walk at another face while
 * keeping the view's task share.
 */
pub trait BoundaryAccess<const D: usize>: FieldAccess<D> {
    fn set_boundary_to_iterate(&mut self, boundary: BoundaryId);
}




/**
 * A stepper paired with a value buffer. All plain field iteration in the
 * crate is some instantiation of this.
 */
pub struct FieldView<S, V> {
    stepper: S,
    values: V,
}




impl<S, V> FieldView<S, V> {

    pub fn new(stepper: S, values: V) -> Self {
        Self { stepper, values }
    }

    pub fn stepper(&self) -> &S {
        &self.stepper
    }
}




impl<const D: usize, S: Stepper<D>, V: ValueGet> FieldAccess<D> for FieldView<S, V> {

    fn first(&mut self) {
        self.stepper.first();
    }

    #[inline]
    fn next(&mut self) {
        self.stepper.next();
    }

    #[inline]
    fn is_in_field(&self) -> bool {
        self.stepper.is_in_field()
    }

    #[inline]
    fn current_index(&self, dimension: usize) -> usize {
        self.stepper.current_index(dimension)
    }

    #[inline]
    fn current_value(&self) -> f64 {
        debug_assert!(self.stepper.is_in_field());
        self.values.value(self.stepper.index())
    }

    #[inline]
    fn current_neighbor(&self, dimension: usize, offset: isize) -> f64 {
        self.values.value(self.stepper.linear_neighbor_index(dimension, offset))
    }

    fn size(&self, dimension: usize) -> usize {
        self.stepper.size(dimension)
    }
}




impl<const D: usize, S: Stepper<D>, V: ValueSet> FieldAccessMut<D> for FieldView<S, V> {

    #[inline]
    fn set_current_value(&mut self, value: f64) {
        debug_assert!(self.stepper.is_in_field());
        self.values.set_value(self.stepper.index(), value);
    }

    #[inline]
    fn set_current_neighbor(&mut self, dimension: usize, offset: isize, value: f64) {
        let index = self.stepper.linear_neighbor_index(dimension, offset);
        self.values.set_value(index, value);
    }
}




impl<const D: usize, V: ValueGet> BoundaryAccess<D> for FieldView<BoundaryStepper<D>, V> {

    fn set_boundary_to_iterate(&mut self, boundary: BoundaryId) {
        self.stepper.set_boundary_to_iterate(boundary);
    }
}


/// A read view over a whole field slice.
pub type WholeFieldView<'a, const D: usize> = FieldView<WholeFieldStepper<D>, &'a [f64]>;

/// A read view over one face of a field slice.
pub type BoundaryView<'a, const D: usize> = FieldView<BoundaryStepper<D>, &'a [f64]>;




// ============================================================================
#[cfg(test)]
mod test {
    use super::*;
    use crate::stepper::FieldGeometry;

    #[test]
    fn view_walk_reads_values_in_storage_order() {
        let geometry = FieldGeometry::new([2, 3]);
        let values: Vec<f64> = (0..6).map(|i| i as f64 * 10.0).collect();
        let mut view = FieldView::new(WholeFieldStepper::new(geometry), values.as_slice());

        view.first();
        let mut walked = Vec::new();
        while view.is_in_field() {
            walked.push(view.current_value());
            view.next();
        }
        assert_eq!(walked, vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0]);
    }

    #[test]
    fn neighbors_follow_strides() {
        let geometry = FieldGeometry::new([2, 3]);
        let values: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let mut view = FieldView::new(WholeFieldStepper::new(geometry), values.as_slice());

        // step to (1, 1), linear index 3
        view.first();
        view.next();
        view.next();
        view.next();
        assert_eq!(view.current_index(0), 1);
        assert_eq!(view.current_index(1), 1);
        assert_eq!(view.current_value(), 3.0);
        assert_eq!(view.current_neighbor(0, -1), 2.0);
        assert_eq!(view.current_neighbor(1, 1), 5.0);
        assert_eq!(view.current_neighbor(1, -1), 1.0);
    }

    #[test]
    fn mutable_view_writes_through() {
        let geometry = FieldGeometry::new([2, 2]);
        let mut values = vec![0.0; 4];
        let mut view = FieldView::new(WholeFieldStepper::new(geometry), values.as_mut_slice());

        view.first();
        let mut k = 0.0;
        while view.is_in_field() {
            view.set_current_value(k);
            k += 1.0;
            view.next();
        }
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn boundary_view_retargets_with_the_face() {
        let geometry = FieldGeometry::new([3, 3]);
        let values: Vec<f64> = (0..9).map(|i| i as f64).collect();
        let mut view = FieldView::new(BoundaryStepper::new(geometry), values.as_slice());

        view.set_boundary_to_iterate(BoundaryId::new(0, false));
        let mut walked = Vec::new();
        while view.is_in_field() {
            walked.push(view.current_value());
            view.next();
        }
        assert_eq!(walked, vec![2.0, 5.0, 8.0]);

        view.set_boundary_to_iterate(BoundaryId::new(1, true));
        let mut walked = Vec::new();
        while view.is_in_field() {
            walked.push(view.current_value());
            view.next();
        }
        assert_eq!(walked, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn shared_slice_reads_and_writes() {
        let mut values = vec![1.0, 2.0, 3.0];
        let shared = SharedSlice::new(&mut values);
        let mut a = shared;
        a.set_value(1, 9.0);
        assert_eq!(shared.value(0), 1.0);
        assert_eq!(shared.value(1), 9.0);
        assert_eq!(values, vec![1.0, 9.0, 3.0]);
    }
}
