use crate::boundary::BoundaryId;
use crate::magic::MagicNumber;




/**
 * Describes the shape of a D-dimensional field stored in one flat buffer in
 * lexicographic order (dimension 0 varies fastest). Strides, the total
 * element count, and the fast-division constants for every size and stride
 * are precomputed here, once, so that steppers can decode multi-index
 * coordinates from a linear index without integer division.
 */
#[derive(Clone, Copy, Debug)]
pub struct FieldGeometry<const D: usize> {
    size: [u32; D],
    stride: [u32; D],
    total: u32,
    magic_stride: [MagicNumber; D],
    magic_size: [MagicNumber; D],
}




impl<const D: usize> FieldGeometry<D> {


    pub fn new(sizes: [usize; D]) -> Self {
        let mut size = [0u32; D];
        let mut stride = [1u32; D];
        let mut total: u64 = 1;

        for i in 0..D {
            assert!(sizes[i] <= u32::MAX as usize, "dimension size must fit in 32 bits");
            size[i] = sizes[i] as u32;
            stride[i] = total as u32;
            total *= sizes[i] as u64;
            assert!(total <= u32::MAX as u64, "field element count must fit in 32 bits");
        }

        let magic_stride = std::array::from_fn(|i| MagicNumber::compute(stride[i]));
        let magic_size = std::array::from_fn(|i| MagicNumber::compute(size[i]));

        Self {
            size,
            stride,
            total: total as u32,
            magic_stride,
            magic_size,
        }
    }


    /**
     * Return the number of elements along the given dimension.
     */
    pub fn size(&self, dimension: usize) -> usize {
        self.size[dimension] as usize
    }


    /**
     * Return the total number of elements in the field.
     */
    pub fn total(&self) -> usize {
        self.total as usize
    }


    /**
     * Return the linear-index distance between neighbors along the given
     * dimension. `stride(D)` is the total element count, which is the
     * row-skip target for a stepper walking the last dimension's face.
     */
    pub fn stride(&self, dimension: usize) -> usize {
        if dimension == D {
            self.total as usize
        } else {
            self.stride[dimension] as usize
        }
    }


    /**
     * Decode the `dimension`-th coordinate of the element at the given
     * linear index: `(index / stride[dimension]) % size[dimension]`, carried
     * out with two chained fast divisions.
     */
    #[inline]
    pub fn coordinate(&self, index: usize, dimension: usize) -> usize {
        let along = self.magic_stride[dimension].divide(index as u64);
        let wraps = self.magic_size[dimension].divide(along);
        (along - self.size[dimension] as u64 * wraps) as usize
    }
}




/**
 * The walk contract shared by the whole-field and single-face steppers. A
 * stepper owns a closed index range `[min, max]` within a field geometry and
 * a cursor; `next` is O(1) and coordinate decode is O(1) per dimension.
 */
pub trait Stepper<const D: usize> {
    fn geometry(&self) -> &FieldGeometry<D>;

    /// The linear index currently pointed at. Internal to the view layer;
    /// callers of a view never see linear indices.
    fn index(&self) -> usize;

    /// Point back at the first element of this stepper's range.
    fn first(&mut self);

    /// Advance one step. Must only be called while `is_in_field`.
    fn next(&mut self);

    fn is_in_field(&self) -> bool;

    /// The `dimension`-th coordinate of the current element.
    #[inline]
    fn current_index(&self, dimension: usize) -> usize {
        debug_assert!(self.is_in_field());
        self.geometry().coordinate(self.index(), dimension)
    }

    /// Whether the element `offset` steps away along `dimension` is inside
    /// the field. Negative offsets look below the current element.
    #[inline]
    fn neighbor_in_field(&self, dimension: usize, offset: isize) -> bool {
        let along = offset + self.current_index(dimension) as isize;
        along >= 0 && along < self.geometry().size(dimension) as isize
    }

    /// Linear index of the element `offset` steps away along `dimension`.
    /// Calling this for a neighbor outside the field is a contract
    /// violation.
    #[inline]
    fn linear_neighbor_index(&self, dimension: usize, offset: isize) -> usize {
        debug_assert!(self.neighbor_in_field(dimension, offset));
        (self.index() as isize + offset * self.geometry().stride(dimension) as isize) as usize
    }

    fn size(&self, dimension: usize) -> usize {
        self.geometry().size(dimension)
    }
}


/// Split `count` work items across `num_tasks` contiguous chunks: the first
/// `count % num_tasks` tasks get one extra item. Returns the task's first
/// item and its chunk length.
fn share_of(count: usize, task_id: usize, num_tasks: usize) -> (usize, usize) {
    let remainder = count % num_tasks;
    let mut chunk = count / num_tasks;
    let start = if task_id < remainder {
        chunk += 1;
        chunk * task_id
    } else {
        chunk * task_id + remainder
    };
    (start, chunk)
}




/**
 * Stepper visiting every element of a contiguous slice of the field in
 * lexicographic order: `next` is a plain increment. Each `(task_id,
 * num_tasks)` pair owns a disjoint sub-range; the union over all tasks is
 * exactly `[0, total)`.
 */
#[derive(Clone, Debug)]
pub struct WholeFieldStepper<const D: usize> {
    geometry: FieldGeometry<D>,
    min_index: usize,
    max_index: usize,
    index: usize,
}




impl<const D: usize> WholeFieldStepper<D> {


    /**
     * A stepper over the entire field.
     */
    pub fn new(geometry: FieldGeometry<D>) -> Self {
        Self::task(geometry, 0, 1)
    }


    /**
     * A stepper over the sub-range owned by one task.
     */
    pub fn task(geometry: FieldGeometry<D>, task_id: usize, num_tasks: usize) -> Self {
        let (start, chunk) = share_of(geometry.total(), task_id, num_tasks);
        let (min_index, max_index) = if chunk == 0 {
            (1, 0) // the empty range
        } else {
            (start, start + chunk - 1)
        };
        Self {
            geometry,
            min_index,
            max_index,
            index: min_index,
        }
    }
}




impl<const D: usize> Stepper<D> for WholeFieldStepper<D> {

    fn geometry(&self) -> &FieldGeometry<D> {
        &self.geometry
    }

    fn index(&self) -> usize {
        self.index
    }

    fn first(&mut self) {
        self.index = self.min_index;
    }

    #[inline]
    fn next(&mut self) {
        debug_assert!(self.is_in_field());
        self.index += 1;
    }

    #[inline]
    fn is_in_field(&self) -> bool {
        self.index >= self.min_index && self.index <= self.max_index
    }
}




/**
 * Stepper visiting the elements of one face (a hyperplane where one
 * coordinate is pinned at its minimum or maximum), in lexicographic order
 * over the remaining dimensions. Within a row along the face's dimension the
 * advance is an increment; at a row end it skips to the next row in O(1).
 */
#[derive(Clone, Debug)]
pub struct BoundaryStepper<const D: usize> {
    geometry: FieldGeometry<D>,
    boundary: BoundaryId,
    task_id: usize,
    num_tasks: usize,
    min_index: usize,
    max_index: usize,
    index: usize,
}




impl<const D: usize> BoundaryStepper<D> {


    /**
     * A stepper over an entire face; starts out on the lower face of
     * dimension 0.
     */
    pub fn new(geometry: FieldGeometry<D>) -> Self {
        Self::task(geometry, 0, 1)
    }


    /**
     * A stepper over the face sub-range owned by one task. The partition is
     * remembered, so re-targeting the stepper at another face keeps the same
     * task's share.
     */
    pub fn task(geometry: FieldGeometry<D>, task_id: usize, num_tasks: usize) -> Self {
        let mut stepper = Self {
            geometry,
            boundary: BoundaryId::first(),
            task_id,
            num_tasks,
            min_index: 1,
            max_index: 0,
            index: 1,
        };
        stepper.set_boundary_to_iterate(BoundaryId::first());
        stepper
    }


    pub fn boundary(&self) -> BoundaryId {
        self.boundary
    }


    /**
     * Re-target the stepper at the given face and point at the first element
     * of this task's share of it. A face with no elements yields an empty
     * range regardless of the task count.
     */
    pub fn set_boundary_to_iterate(&mut self, boundary: BoundaryId) {
        assert!(boundary.dimension() < D);
        self.boundary = boundary;
        self.set_index_limits();
        self.first();
    }


    fn set_index_limits(&mut self) {
        let dimension = self.boundary.dimension();
        let total = self.geometry.total();
        let boundary_size = if total == 0 {
            0
        } else {
            total / self.geometry.size(dimension)
        };
        let (steps_to_min, chunk) = share_of(boundary_size, self.task_id, self.num_tasks);

        if boundary_size == 0 || chunk == 0 {
            self.min_index = 1;
            self.max_index = 0;
            return;
        }

        let stride = self.geometry.stride(dimension);
        let next_stride = self.geometry.stride(dimension + 1);
        let min_index_on_boundary = if self.boundary.is_lower_side() {
            0
        } else {
            stride * (self.geometry.size(dimension) - 1)
        };
        let steps_to_max = steps_to_min + chunk - 1;

        self.min_index =
            min_index_on_boundary + steps_to_min % stride + steps_to_min / stride * next_stride;
        self.max_index =
            min_index_on_boundary + steps_to_max % stride + steps_to_max / stride * next_stride;
    }
}




impl<const D: usize> Stepper<D> for BoundaryStepper<D> {

    fn geometry(&self) -> &FieldGeometry<D> {
        &self.geometry
    }

    fn index(&self) -> usize {
        self.index
    }

    fn first(&mut self) {
        self.index = self.min_index;
    }

    #[inline]
    fn next(&mut self) {
        debug_assert!(self.is_in_field());
        let stride = self.geometry.stride(self.boundary.dimension());
        if (self.index + 1) % stride != 0 {
            self.index += 1;
        } else {
            let next_stride = self.geometry.stride(self.boundary.dimension() + 1);
            self.index += next_stride - (stride - 1);
        }
    }

    #[inline]
    fn is_in_field(&self) -> bool {
        self.index >= self.min_index && self.index <= self.max_index
    }
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::*;
    use crate::boundary::faces;
    use std::collections::BTreeSet;

    fn geometry_345() -> FieldGeometry<3> {
        FieldGeometry::new([3, 4, 5])
    }

    fn visited<S: Stepper<3>>(stepper: &mut S) -> Vec<usize> {
        let mut indices = Vec::new();
        stepper.first();
        while stepper.is_in_field() {
            indices.push(stepper.index());
            stepper.next();
        }
        indices
    }

    #[test]
    fn strides_and_total() {
        let geometry = geometry_345();
        assert_eq!(geometry.stride(0), 1);
        assert_eq!(geometry.stride(1), 3);
        assert_eq!(geometry.stride(2), 12);
        assert_eq!(geometry.stride(3), 60);
        assert_eq!(geometry.total(), 60);
    }

    #[test]
    fn coordinate_decode_is_dimension_zero_fastest() {
        let geometry = geometry_345();
        assert_eq!(geometry.coordinate(37, 0), 1);
        assert_eq!(geometry.coordinate(37, 1), 0);
        assert_eq!(geometry.coordinate(37, 2), 3);
    }

    #[test]
    fn whole_field_stepper_visits_every_element_once_in_order() {
        let mut stepper = WholeFieldStepper::new(geometry_345());
        let mut count = 0;

        for i2 in 0..5 {
            for i1 in 0..4 {
                for i0 in 0..3 {
                    assert!(stepper.is_in_field());
                    assert_eq!(stepper.current_index(0), i0);
                    assert_eq!(stepper.current_index(1), i1);
                    assert_eq!(stepper.current_index(2), i2);
                    count += 1;
                    stepper.next();
                }
            }
        }
        assert_eq!(count, 60);
        assert!(!stepper.is_in_field());
    }

    #[test]
    fn whole_field_partition_is_disjoint_and_complete() {
        for &num_tasks in &[1usize, 2, 3, 5, 7] {
            let mut seen = BTreeSet::new();
            for task_id in 0..num_tasks {
                let mut stepper = WholeFieldStepper::task(geometry_345(), task_id, num_tasks);
                for index in visited(&mut stepper) {
                    assert!(seen.insert(index), "index {} visited twice", index);
                }
            }
            assert_eq!(seen, (0..60).collect());
        }
    }

    #[test]
    fn boundary_stepper_visits_exactly_the_face() {
        for face in faces::<3>() {
            let mut stepper = BoundaryStepper::new(geometry_345());
            stepper.set_boundary_to_iterate(face);
            let geometry = geometry_345();
            let pinned = if face.is_lower_side() {
                0
            } else {
                geometry.size(face.dimension()) - 1
            };
            let expected: BTreeSet<usize> = (0..60)
                .filter(|&i| geometry.coordinate(i, face.dimension()) == pinned)
                .collect();
            let walked: Vec<usize> = visited(&mut stepper);
            let walked_set: BTreeSet<usize> = walked.iter().copied().collect();
            assert_eq!(walked.len(), walked_set.len(), "face revisited an index");
            assert_eq!(walked_set, expected, "face {:?}", face);

            let mut sorted = walked.clone();
            sorted.sort_unstable();
            assert_eq!(walked, sorted, "face walk is not in increasing linear order");
        }
    }

    #[test]
    fn boundary_partition_is_disjoint_and_complete() {
        for face in faces::<3>() {
            for &num_tasks in &[1usize, 2, 3, 5] {
                let mut seen = BTreeSet::new();
                for task_id in 0..num_tasks {
                    let mut stepper = BoundaryStepper::task(geometry_345(), task_id, num_tasks);
                    stepper.set_boundary_to_iterate(face);
                    for index in visited(&mut stepper) {
                        assert!(seen.insert(index));
                    }
                }
                let geometry = geometry_345();
                let pinned = if face.is_lower_side() {
                    0
                } else {
                    geometry.size(face.dimension()) - 1
                };
                let expected: BTreeSet<usize> = (0..60)
                    .filter(|&i| geometry.coordinate(i, face.dimension()) == pinned)
                    .collect();
                assert_eq!(seen, expected, "face {:?} tasks {}", face, num_tasks);
            }
        }
    }

    #[test]
    fn empty_face_has_empty_range_for_any_task_count() {
        let geometry = FieldGeometry::new([3, 0, 5]);
        for &num_tasks in &[1usize, 2, 5] {
            for task_id in 0..num_tasks {
                let mut stepper = BoundaryStepper::task(geometry, task_id, num_tasks);
                stepper.set_boundary_to_iterate(BoundaryId::new(0, true));
                assert!(!stepper.is_in_field());
            }
        }
    }

    #[test]
    fn neighbor_index_moves_by_stride() {
        let mut stepper = WholeFieldStepper::new(geometry_345());
        stepper.first();
        while stepper.current_index(1) != 2 || stepper.current_index(0) != 1 {
            stepper.next();
        }
        let here = stepper.index();
        assert!(stepper.neighbor_in_field(1, 1));
        assert_eq!(stepper.linear_neighbor_index(1, 1), here + 3);
        assert!(stepper.neighbor_in_field(1, -2));
        assert_eq!(stepper.linear_neighbor_index(1, -2), here - 6);
        assert!(!stepper.neighbor_in_field(1, 2));
        assert!(!stepper.neighbor_in_field(0, -2));
    }
}
