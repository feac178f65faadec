use crate::block::{Block, GhostExchange};
use crate::boundary::BoundaryId;
use crate::composed::ComposedBoundaryView;
use crate::executor::TaskExecutor;
use crate::field::{
    BoundaryAccess, FieldAccess, FieldAccessMut, FieldView, SharedSlice,
};
use crate::ghost::GhostRegion;
use crate::stepper::{BoundaryStepper, FieldGeometry, WholeFieldStepper};
use crate::timer::Timer;
use std::time::Duration;




/**
 * A constant-weight central difference stencil: along each dimension it taps
 * `EXTENT` points on either side of the center, with weight index 0 the
 * leftmost tap, `EXTENT` the center and `2 * EXTENT` the rightmost.
 */
pub trait Stencil<const D: usize>: Sync {
    /// How far the taps reach on each side of the center point.
    const EXTENT: usize;

    fn weight(&self, dimension: usize, tap: usize) -> f64;
}




/**
 * The eighth-order accurate Laplacian: the 9-point second-derivative weights
 * divided by the squared step length, summed over the dimensions.
 */
pub struct Laplacian8<const D: usize> {
    weights: [[f64; 9]; D],
}




impl<const D: usize> Laplacian8<D> {

    pub fn new(step_length: [f64; D]) -> Self {
        let weights = std::array::from_fn(|d| {
            let h2 = step_length[d] * step_length[d];
            [
                -1.0 / 560.0 / h2,
                8.0 / 315.0 / h2,
                -1.0 / 5.0 / h2,
                8.0 / 5.0 / h2,
                -205.0 / 72.0 / h2,
                8.0 / 5.0 / h2,
                -1.0 / 5.0 / h2,
                8.0 / 315.0 / h2,
                -1.0 / 560.0 / h2,
            ]
        });
        Self { weights }
    }
}




impl<const D: usize> Stencil<D> for Laplacian8<D> {

    const EXTENT: usize = 4;

    #[inline]
    fn weight(&self, dimension: usize, tap: usize) -> f64 {
        self.weights[dimension][tap]
    }
}




/**
 * Applies a stencil to blocks in two phases, overlapping computation with
 * the ghost exchange: the inner phase sweeps every point but defers the taps
 * that would leave the block, and one boundary pass per face supplies the
 * deferred taps as soon as that face's ghost data has arrived, in whatever
 * order the 2 * D faces come in.
 */
pub struct StencilOperator<'a, const D: usize, S> {
    stencil: S,
    executor: &'a TaskExecutor,
    compute_timer: Timer,
}




impl<'a, const D: usize, S: Stencil<D>> StencilOperator<'a, D, S> {


    pub fn new(stencil: S, executor: &'a TaskExecutor) -> Self {
        Self {
            stencil,
            executor,
            compute_timer: Timer::new(),
        }
    }


    /// Total time spent computing (as opposed to waiting on the exchange).
    pub fn computation_time(&self) -> Duration {
        self.compute_timer.total()
    }


    pub fn reset_computation_time(&mut self) {
        self.compute_timer.reset();
    }


    /**
     * Apply the stencil to `input`, writing into `result`'s interior. The
     * caller starts the exchange cycle before this call; every face receive
     * of that cycle is consumed here. The result buffer is allocated on
     * first use.
     */
    pub fn apply<E, R>(&mut self, input: &mut Block<D, E>, result: &Block<D, R>)
    where
        E: GhostExchange<D>,
    {
        let extent = S::EXTENT;
        let points_along = input.elements_per_dim();
        assert!(
            extent <= input.ghost_width(),
            "stencil reach exceeds the ghost width"
        );
        assert!(2 * extent <= points_along, "block too small for the stencil reach");
        assert_eq!(points_along, result.elements_per_dim());

        let mut result_values = result.values_mut();
        if result_values.is_empty() {
            *result_values = vec![0.0; result.geometry().total()];
        }
        let target = SharedSlice::new(&mut result_values);
        let target_geometry = *result.geometry();
        let stencil = &self.stencil;
        let executor = self.executor;

        self.compute_timer.start();
        {
            let source_values = input.values_read();
            let source_slice: &[f64] = &source_values;
            let source_geometry = *input.geometry();

            executor.execute(|task_id, num_tasks| {
                move || {
                    let mut source = FieldView::new(
                        WholeFieldStepper::task(source_geometry, task_id, num_tasks),
                        source_slice,
                    );
                    let mut target = FieldView::new(
                        WholeFieldStepper::task(target_geometry, task_id, num_tasks),
                        target,
                    );
                    while source.is_in_field() {
                        let mut value = 0.0;
                        for dimension in 0..D {
                            let along = source.current_index(dimension);
                            if along >= extent {
                                for tap in 0..extent {
                                    value += stencil.weight(dimension, tap)
                                        * source.current_neighbor(
                                            dimension,
                                            tap as isize - extent as isize,
                                        );
                                }
                            }
                            value += stencil.weight(dimension, extent) * source.current_value();
                            if along + extent < points_along {
                                for tap in 1..=extent {
                                    value += stencil.weight(dimension, extent + tap)
                                        * source.current_neighbor(dimension, tap as isize);
                                }
                            }
                        }
                        target.set_current_value(value);
                        source.next();
                        target.next();
                    }
                }
            });
        }
        self.compute_timer.stop();

        for _ in 0..2 * D {
            let face = input.wait_next_received();
            self.compute_timer.start();
            apply_in_boundary_region::<D, S, E>(
                stencil, executor, input, target, target_geometry, face,
            );
            self.compute_timer.stop();
        }
    }
}




/// Supply the taps deferred by the inner phase for every point within
/// `EXTENT` of `face`, now that the face's ghost data is present. The walk
/// runs along the face; each face point updates itself and the points behind
/// it, reading neighbors through the composed view so off-block taps hit the
/// ghost regions.
fn apply_in_boundary_region<const D: usize, S, E>(
    stencil: &S,
    executor: &TaskExecutor,
    input: &Block<D, E>,
    target: SharedSlice,
    target_geometry: FieldGeometry<D>,
    face: BoundaryId,
) where
    S: Stencil<D>,
{
    let extent = S::EXTENT;
    let dimension = face.dimension();
    // Weight index of the first deferred tap, and which way "behind the
    // face" points: a lower face defers the left taps and updates inward in
    // the positive direction.
    let lowest_weight = if face.is_lower_side() { 0 } else { extent + 1 };
    let direction: isize = if face.is_lower_side() { 1 } else { -1 };
    let max_distance = direction * extent as isize;

    let source_values = input.values_read();
    let source_slice: &[f64] = &source_values;
    let source_geometry = *input.geometry();
    let ghosts: [[&GhostRegion<D>; 2]; D] = std::array::from_fn(|d| {
        [
            input.ghost(BoundaryId::new(d, true)),
            input.ghost(BoundaryId::new(d, false)),
        ]
    });

    executor.execute(|task_id, num_tasks| {
        move || {
            let main = FieldView::new(
                BoundaryStepper::task(source_geometry, task_id, num_tasks),
                source_slice,
            );
            let sides = std::array::from_fn(|d| {
                [
                    ghosts[d][0].boundary_view(task_id, num_tasks),
                    ghosts[d][1].boundary_view(task_id, num_tasks),
                ]
            });
            let mut source = ComposedBoundaryView::new(main, sides, face);
            let mut target = FieldView::new(
                BoundaryStepper::task(target_geometry, task_id, num_tasks),
                target,
            );
            target.set_boundary_to_iterate(face);

            while source.is_in_field() {
                let mut distance = 0isize;
                while distance != max_distance {
                    let mut value = target.current_neighbor(dimension, distance);
                    for tap in 0..extent {
                        let offset =
                            lowest_weight as isize - extent as isize + distance + tap as isize;
                        value += stencil.weight(dimension, lowest_weight + tap)
                            * source.current_neighbor(dimension, offset);
                    }
                    target.set_current_neighbor(dimension, distance, value);
                    distance += direction;
                }
                source.next();
                target.next();
            }
        }
    });
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::*;
    use crate::block::{Block, NoExchange};
    use std::f64::consts::PI;

    fn executor() -> TaskExecutor {
        TaskExecutor::new(3)
    }

    /// Reference periodic convolution of the same weights, for pinning the
    /// two-phase result against a single obvious loop.
    fn periodic_reference_1d(stencil: &Laplacian8<1>, values: &[f64]) -> Vec<f64> {
        let n = values.len() as isize;
        (0..n)
            .map(|i| {
                (0..9)
                    .map(|tap| {
                        let j = (i + tap as isize - 4).rem_euclid(n) as usize;
                        stencil.weight(0, tap) * values[j]
                    })
                    .sum()
            })
            .collect()
    }

    #[test]
    fn matches_a_periodic_reference_convolution_in_1d() {
        let executor = executor();
        let n = 16;
        let values: Vec<f64> = (0..n).map(|i| (i as f64 * 0.7).cos() + 0.1 * i as f64).collect();

        let mut input: Block<1, _> = Block::composed(n, 4);
        let result: Block<1, NoExchange> = Block::pure(n);
        input.set_values(values.clone());

        let stencil = Laplacian8::new([1.0]);
        let expected = periodic_reference_1d(&stencil, &values);

        let mut operator = StencilOperator::new(stencil, &executor);
        input.start_exchange();
        operator.apply(&mut input, &result);
        input.finish_sends();

        let got = result.values_read();
        for (g, e) in got.iter().zip(expected.iter()) {
            assert!((g - e).abs() <= 1e-10 * e.abs().max(1.0), "{} vs {}", g, e);
        }
    }

    #[test]
    fn approximates_the_laplacian_of_a_smooth_periodic_field() {
        let executor = executor();
        let n = 10;
        let h = 2.0 * PI / n as f64;

        let mut input: Block<3, _> = Block::composed(n, 4);
        let result: Block<3, NoExchange> = Block::pure(n);

        let geometry = *input.geometry();
        let value_at = |i: usize| {
            let x = geometry.coordinate(i, 0) as f64 * h;
            let y = geometry.coordinate(i, 1) as f64 * h;
            let z = geometry.coordinate(i, 2) as f64 * h;
            x.sin() + y.sin() + z.sin()
        };
        input.set_values((0..geometry.total()).map(value_at).collect());

        let mut operator = StencilOperator::new(Laplacian8::new([h; 3]), &executor);
        input.start_exchange();
        operator.apply(&mut input, &result);
        input.finish_sends();

        // The exact Laplacian of sin x + sin y + sin z is its negation. The
        // truncation error at this resolution is 3 * h^8 / 3150, about
        // 2.4e-5.
        let got = result.values_read();
        let mut worst: f64 = 0.0;
        for i in 0..geometry.total() {
            worst = worst.max((got[i] + value_at(i)).abs());
        }
        assert!(worst < 5e-5, "worst error {}", worst);
        assert!(operator.computation_time() > Duration::ZERO);
    }

    #[test]
    #[should_panic(expected = "stencil reach exceeds the ghost width")]
    fn rejects_a_ghost_width_narrower_than_the_reach() {
        let executor = executor();
        let mut input: Block<1, _> = Block::composed(16, 2);
        let result: Block<1, NoExchange> = Block::pure(16);
        input.set_values(vec![0.0; 16]);
        let mut operator = StencilOperator::new(Laplacian8::new([1.0]), &executor);
        input.start_exchange();
        operator.apply(&mut input, &result);
    }
}
