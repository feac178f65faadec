/// Identifies one face of a D-dimensional block: the set of elements where
/// the coordinate along `dimension` is fixed at its minimum (`lower`) or its
/// maximum. Faces are ordered (0, lower), (0, upper), (1, lower), (1, upper)
/// and so on; that order is the canonical enumeration used everywhere a loop
/// runs over all 2 * D faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundaryId {
    dimension: usize,
    lower: bool,
}

impl BoundaryId {
    pub fn new(dimension: usize, lower: bool) -> Self {
        Self { dimension, lower }
    }

    /// The lower face along dimension 0, the first face in canonical order.
    pub fn first() -> Self {
        Self::new(0, true)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn is_lower_side(&self) -> bool {
        self.lower
    }

    /// The face on the other side of the same dimension.
    pub fn opposite(&self) -> Self {
        Self::new(self.dimension, !self.lower)
    }

    /// Advance to the next face in canonical order: lower goes to upper, and
    /// upper goes to the next dimension's lower.
    pub fn step(&mut self) {
        self.lower = !self.lower;
        if self.lower {
            self.dimension += 1;
        }
    }

    /// Position of this face in canonical order, also the message tag under
    /// which this face's ghost data arrives: a process receives data for its
    /// `(d, lower)` ghost from the upper face of the neighbor below it, which
    /// was sent under tag `2 * d + 1`, and data for its `(d, upper)` ghost
    /// under tag `2 * d`.
    pub fn receive_tag(&self) -> u16 {
        (2 * self.dimension + if self.lower { 1 } else { 0 }) as u16
    }

    /// Invert `receive_tag`.
    pub fn from_receive_tag(tag: u16) -> Self {
        Self::new(tag as usize / 2, tag % 2 == 1)
    }
}

/// All 2 * D faces in canonical order.
pub fn faces<const D: usize>() -> impl Iterator<Item = BoundaryId> {
    (0..D).flat_map(|dimension| {
        [true, false]
            .iter()
            .map(move |&lower| BoundaryId::new(dimension, lower))
    })
}
