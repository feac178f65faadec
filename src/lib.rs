//! Halocline computes finite-difference stencils on blocks of an
//! N-dimensional structured grid, with the grid partitioned across ranks
//! and the blocks trading their boundary slabs through ghost regions. The
//! stencil application is split into an inner sweep and per-face boundary
//! passes so that computation overlaps the exchange: each face's deferred
//! taps are applied as soon as that face's ghost data arrives, in whatever
//! order the faces come in. Within a rank, sweeps are statically partitioned
//! over a fixed pool of pinned worker threads, and the hot multi-index
//! decode runs on precomputed magic-number division.

pub mod block;
pub mod boundary;
pub mod composed;
pub mod executor;
pub mod field;
pub mod ghost;
pub mod magic;
pub mod stencil;
pub mod stepper;
pub mod timer;
pub mod transport;
