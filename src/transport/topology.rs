/**
 * A periodic Cartesian arrangement of ranks: the process count is factored
 * into a near-balanced D-dimensional grid, ranks are laid out row-major with
 * the last dimension varying fastest, and every rank has a lower and an
 * upper neighbor along each dimension, wrapping at the grid edges. A
 * single-rank grid, or a dimension of extent 1, makes a rank its own
 * neighbor, which is what gives a lone process periodic boundaries for free.
 */
#[derive(Clone, Copy, Debug)]
pub struct CartTopology<const D: usize> {
    dims: [usize; D],
    coords: [usize; D],
    rank: usize,
    size: usize,
}




impl<const D: usize> CartTopology<D> {


    pub fn new(rank: usize, size: usize) -> Self {
        assert!(size > 0 && rank < size);
        let dims = balanced_dims(size);
        let mut coords = [0; D];
        let mut remainder = rank;
        for i in (0..D).rev() {
            coords[i] = remainder % dims[i];
            remainder /= dims[i];
        }
        Self {
            dims,
            coords,
            rank,
            size,
        }
    }


    pub fn dims(&self) -> [usize; D] {
        self.dims
    }


    pub fn coords(&self) -> [usize; D] {
        self.coords
    }


    pub fn rank(&self) -> usize {
        self.rank
    }


    /**
     * The rank on the other side of this rank's lower or upper face along
     * `dimension`, with periodic wrap-around.
     */
    pub fn neighbor(&self, dimension: usize, upper: bool) -> usize {
        let extent = self.dims[dimension];
        let mut coords = self.coords;
        coords[dimension] = if upper {
            (coords[dimension] + 1) % extent
        } else {
            (coords[dimension] + extent - 1) % extent
        };
        self.rank_of(coords)
    }


    fn rank_of(&self, coords: [usize; D]) -> usize {
        let mut rank = 0;
        for i in 0..D {
            rank = rank * self.dims[i] + coords[i];
        }
        rank
    }
}


/// Factor `size` into D near-equal extents, largest first: the prime
/// factors, taken in decreasing order, each go to the dimension with the
/// smallest extent so far.
fn balanced_dims<const D: usize>(size: usize) -> [usize; D] {
    let mut factors = prime_factors(size);
    factors.sort_unstable_by(|a, b| b.cmp(a));

    let mut dims = [1usize; D];
    for factor in factors {
        let smallest = (0..D).min_by_key(|&i| dims[i]).unwrap();
        dims[smallest] *= factor;
    }
    dims.sort_unstable_by(|a, b| b.cmp(a));
    dims
}


fn prime_factors(mut n: usize) -> Vec<usize> {
    let mut factors = Vec::new();
    let mut p = 2;
    while p * p <= n {
        while n % p == 0 {
            factors.push(p);
            n /= p;
        }
        p += 1;
    }
    if n > 1 {
        factors.push(n);
    }
    factors
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dims_are_balanced_and_decreasing() {
        assert_eq!(balanced_dims::<2>(6), [3, 2]);
        assert_eq!(balanced_dims::<2>(8), [4, 2]);
        assert_eq!(balanced_dims::<3>(12), [3, 2, 2]);
        assert_eq!(balanced_dims::<3>(7), [7, 1, 1]);
        assert_eq!(balanced_dims::<2>(1), [1, 1]);
    }

    #[test]
    fn coords_round_trip_through_ranks() {
        for rank in 0..12 {
            let topology: CartTopology<3> = CartTopology::new(rank, 12);
            assert_eq!(topology.rank_of(topology.coords()), rank);
        }
    }

    #[test]
    fn last_dimension_varies_fastest() {
        let topology: CartTopology<2> = CartTopology::new(3, 6); // dims (3, 2)
        assert_eq!(topology.coords(), [1, 1]);
    }

    #[test]
    fn neighbors_wrap_periodically() {
        // dims (3, 2): rank = 2 * c0 + c1
        let topology: CartTopology<2> = CartTopology::new(0, 6);
        assert_eq!(topology.neighbor(0, true), 2);
        assert_eq!(topology.neighbor(0, false), 4);
        assert_eq!(topology.neighbor(1, true), 1);
        assert_eq!(topology.neighbor(1, false), 1);
    }

    #[test]
    fn a_lone_rank_is_its_own_neighbor_everywhere() {
        let topology: CartTopology<3> = CartTopology::new(0, 1);
        for dimension in 0..3 {
            assert_eq!(topology.neighbor(dimension, true), 0);
            assert_eq!(topology.neighbor(dimension, false), 0);
        }
    }
}
