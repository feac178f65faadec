use crate::boundary::BoundaryId;
use crate::field::{BoundaryAccess, FieldAccess, FieldAccessMut};




/**
 * A view that stitches a block interior together with its 2 * D ghost
 * regions and walks one interior face. Neighbor lookups that step past the
 * interior are redirected into the ghost region on that side, so a stencil's
 * boundary loop reads off-block values with the same `(dimension, offset)`
 * calls it uses everywhere else.
 *
 * `M` walks the interior face, `G` walks a ghost face; both are re-aimed
 * together by [`set_face_to_iterate`](Self::set_face_to_iterate), with the
 * ghost view on the iterated side targeting the face of its region adjacent
 * to the interior, and the two advance in lockstep.
 */
pub struct ComposedBoundaryView<const D: usize, M, G> {
    main: M,
    sides: [[G; 2]; D],
    face: BoundaryId,
}




impl<const D: usize, M, G> ComposedBoundaryView<D, M, G>
where
    M: BoundaryAccess<D>,
    G: BoundaryAccess<D>,
{


    /**
     * Build a view from an interior face walker and one ghost face walker
     * per side, indexed `sides[dimension][0 = lower, 1 = upper]`. The view
     * starts out aimed at `face`.
     */
    pub fn new(main: M, sides: [[G; 2]; D], face: BoundaryId) -> Self {
        let mut view = Self { main, sides, face };
        view.set_face_to_iterate(face);
        view
    }


    /**
     * Aim the walk at the given interior face. The ghost region on the
     * iterated side is walked along its face adjacent to the interior, which
     * is the one opposite in orientation, in lockstep with the interior
     * walk, so its elements line up with the interior elements being
     * visited.
     */
    pub fn set_face_to_iterate(&mut self, face: BoundaryId) {
        assert!(face.dimension() < D);
        self.face = face;
        self.main.set_boundary_to_iterate(face);
        self.iterated_side_mut().set_boundary_to_iterate(face.opposite());
        self.first();
    }


    fn side(&self, dimension: usize, lower: bool) -> &G {
        &self.sides[dimension][if lower { 0 } else { 1 }]
    }

    fn iterated_side_mut(&mut self) -> &mut G {
        let d = self.face.dimension();
        let s = if self.face.is_lower_side() { 0 } else { 1 };
        &mut self.sides[d][s]
    }
}




impl<const D: usize, M, G> FieldAccess<D> for ComposedBoundaryView<D, M, G>
where
    M: BoundaryAccess<D>,
    G: BoundaryAccess<D>,
{

    fn first(&mut self) {
        self.main.first();
        self.iterated_side_mut().first();
    }

    #[inline]
    fn next(&mut self) {
        self.main.next();
        self.iterated_side_mut().next();
    }

    #[inline]
    fn is_in_field(&self) -> bool {
        self.main.is_in_field()
    }

    #[inline]
    fn current_index(&self, dimension: usize) -> usize {
        self.main.current_index(dimension)
    }

    #[inline]
    fn current_value(&self) -> f64 {
        self.main.current_value()
    }

    /// Neighbor lookup with ghost redirection. An offset landing below the
    /// interior reads the lower ghost region, whose walker sits on the face
    /// touching the interior, so `-1` becomes ghost offset `0`, `-2` becomes
    /// `-1` and so on; an offset landing above the interior reads the upper
    /// ghost region symmetrically.
    #[inline]
    fn current_neighbor(&self, dimension: usize, offset: isize) -> f64 {
        let along = offset + self.main.current_index(dimension) as isize;
        let interior = self.main.size(dimension) as isize;
        if along < 0 {
            self.side(dimension, true).current_neighbor(dimension, along + 1)
        } else if along >= interior {
            self.side(dimension, false).current_neighbor(dimension, along - interior)
        } else {
            self.main.current_neighbor(dimension, offset)
        }
    }

    /// Total extent along `dimension`: interior plus both ghost regions.
    fn size(&self, dimension: usize) -> usize {
        self.main.size(dimension)
            + self.side(dimension, true).size(dimension)
            + self.side(dimension, false).size(dimension)
    }
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::*;
    use crate::field::FieldView;
    use crate::stepper::{BoundaryStepper, FieldGeometry};

    // 4 x 4 interior with width-2 ghost regions on every side. Interior
    // values count 0..16; each ghost buffer is filled from a distinct base so
    // redirected reads are unmistakable.
    fn fixture() -> (Vec<f64>, [[Vec<f64>; 2]; 2]) {
        let interior: Vec<f64> = (0..16).map(|i| i as f64).collect();
        let ghosts = [
            [
                (0..8).map(|i| 100.0 + i as f64).collect(),
                (0..8).map(|i| 200.0 + i as f64).collect(),
            ],
            [
                (0..8).map(|i| 300.0 + i as f64).collect(),
                (0..8).map(|i| 400.0 + i as f64).collect(),
            ],
        ];
        (interior, ghosts)
    }

    fn view<'a>(
        interior: &'a [f64],
        ghosts: &'a [[Vec<f64>; 2]; 2],
        face: BoundaryId,
    ) -> ComposedBoundaryView<2, FieldView<BoundaryStepper<2>, &'a [f64]>, FieldView<BoundaryStepper<2>, &'a [f64]>>
    {
        let geometry = FieldGeometry::new([4, 4]);
        let main = FieldView::new(BoundaryStepper::new(geometry), interior);
        let sides = std::array::from_fn(|d| {
            let shape = |width_dim| {
                let mut sizes = [4usize; 2];
                sizes[width_dim] = 2;
                FieldGeometry::new(sizes)
            };
            [
                FieldView::new(BoundaryStepper::new(shape(d)), ghosts[d][0].as_slice()),
                FieldView::new(BoundaryStepper::new(shape(d)), ghosts[d][1].as_slice()),
            ]
        });
        ComposedBoundaryView::new(main, sides, face)
    }

    #[test]
    fn size_sums_interior_and_ghosts() {
        let (interior, ghosts) = fixture();
        let v = view(&interior, &ghosts, BoundaryId::new(0, true));
        assert_eq!(v.size(0), 8);
        assert_eq!(v.size(1), 8);
    }

    #[test]
    fn interior_offsets_read_the_interior() {
        let (interior, ghosts) = fixture();
        let mut v = view(&interior, &ghosts, BoundaryId::new(0, true));
        // second element of the lower-0 face: coordinates (0, 1), linear 4
        v.first();
        v.next();
        assert_eq!(v.current_index(0), 0);
        assert_eq!(v.current_index(1), 1);
        assert_eq!(v.current_value(), 4.0);
        assert_eq!(v.current_neighbor(0, 2), 6.0);
        assert_eq!(v.current_neighbor(1, -1), 0.0);
    }

    #[test]
    fn below_interior_redirects_into_the_lower_ghost() {
        let (interior, ghosts) = fixture();
        let mut v = view(&interior, &ghosts, BoundaryId::new(0, true));
        v.first();
        v.next(); // face element at (0, 1)

        // The lower-0 ghost is 2 x 4 and its walker sits on its upper-0
        // face, lockstepped to row 1: linear index 3, value 103. Offset -1
        // is that element; -2 steps one more into the ghost.
        assert_eq!(v.current_neighbor(0, -1), 103.0);
        assert_eq!(v.current_neighbor(0, -2), 102.0);
    }

    #[test]
    fn above_interior_redirects_into_the_upper_ghost() {
        let (interior, ghosts) = fixture();
        let mut v = view(&interior, &ghosts, BoundaryId::new(0, false));
        v.first();
        v.next(); // face element at (3, 1)

        assert_eq!(v.current_value(), 7.0);
        // The upper-0 ghost walker sits on its lower-0 face, row 1: linear
        // index 2, value 402. Offset +1 is that element.
        assert_eq!(v.current_neighbor(0, 1), 402.0);
        assert_eq!(v.current_neighbor(0, 2), 403.0);
        // Offsets that stay inside the interior are untouched.
        assert_eq!(v.current_neighbor(0, -1), 6.0);
    }

    #[test]
    #[should_panic]
    fn offsets_past_the_ghost_width_are_rejected() {
        let (interior, ghosts) = fixture();
        let mut v = view(&interior, &ghosts, BoundaryId::new(0, true));
        v.first();
        v.next();
        // offset -3 reaches one element past the width-2 lower ghost
        v.current_neighbor(0, -3);
    }

    #[test]
    fn retargeting_keeps_the_ghost_in_lockstep() {
        let (interior, ghosts) = fixture();
        let mut v = view(&interior, &ghosts, BoundaryId::new(0, true));
        v.set_face_to_iterate(BoundaryId::new(1, true));
        // walk the whole lower-1 face, checking the ghost row tracks the
        // interior column
        let mut column = 0;
        while v.is_in_field() {
            assert_eq!(v.current_index(0), column);
            // lower-1 ghost is 4 x 2, walker on its upper-1 face: linear
            // index 4 + column, value 304 + column
            assert_eq!(v.current_neighbor(1, -1), 304.0 + column as f64);
            column += 1;
            v.next();
        }
        assert_eq!(column, 4);
    }
}
