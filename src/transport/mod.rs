pub mod backoff;
pub mod local;
pub mod tcp;
pub mod topology;
pub mod util;

pub use local::{LocalCluster, LocalCommunicator};
pub use tcp::{TcpCommunicator, TcpHost};
pub use topology::CartTopology;


/// Tag reserved for the collective operations; the face-exchange tags only
/// occupy `0 .. 2 * D`.
pub const COLLECTIVE_TAG: u16 = u16::MAX;


/// One delivered message: who sent it, the tag it was sent under, and the
/// value payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub source: usize,
    pub tag: u16,
    pub values: Vec<f64>,
}


/// Interface for a group of processes that exchange tagged value slabs. The
/// underlying transport can be an in-process channel mesh, TCP, or in
/// principle a higher level abstraction like MPI.
///
pub trait Communicator: Send {
    /// Must be implemented to return the rank of this process within the
    /// communicator.
    fn rank(&self) -> usize;

    /// Must be implemented to return the number of peer processes in this
    /// communicator.
    fn size(&self) -> usize;

    /// Must be implemented to send a message to a peer. This method must
    /// return immediately, in other words it is not allowed to block until a
    /// matching receive is posted.
    fn send(&self, rank: usize, tag: u16, values: Vec<f64>);

    /// Must be implemented to receive the next message from any peer,
    /// whichever arrives first. This method is allowed to block until a
    /// message is ready.
    fn recv_any(&self) -> Message;

    /// Implements a binomial tree broadcast from the root node. The value
    /// must be `Some` on the root and `None` everywhere else. Collectives
    /// use their own reserved tag but share the delivery stream with the
    /// exchange traffic, so no exchange may be in flight anywhere in the
    /// group while a collective runs.
    ///
    fn broadcast(&self, value: Option<Vec<f64>>) -> Vec<f64> {
        let r = self.rank();
        let p = self.size();

        let value = match value {
            Some(value) => value,
            None => {
                let message = self.recv_any();
                debug_assert_eq!(message.tag, COLLECTIVE_TAG);
                message.values
            }
        };
        for level in (0..util::ceil_log2(p)).rev() {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 && r + one < p {
                self.send(r + one, COLLECTIVE_TAG, value.clone())
            }
        }
        value
    }

    /// Implements a binomial tree reduce, leaves first. All ranks return
    /// `None` except for the root.
    ///
    fn reduce<F>(&self, f: F, mut value: Vec<f64>) -> Option<Vec<f64>>
    where
        F: Fn(Vec<f64>, Vec<f64>) -> Vec<f64>,
    {
        let r = self.rank();
        let p = self.size();

        for level in 0..util::ceil_log2(p) {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 {
                if r + one < p {
                    let message = self.recv_any();
                    debug_assert_eq!(message.tag, COLLECTIVE_TAG);
                    value = f(value, message.values)
                }
            } else {
                self.send(r - one, COLLECTIVE_TAG, value);
                return None;
            }
        }
        Some(value)
    }

    /// Implements an all-reduce (symmetric fold) over a commutative binary
    /// operator.
    ///
    fn all_reduce<F>(&self, f: F, value: Vec<f64>) -> Vec<f64>
    where
        F: Fn(Vec<f64>, Vec<f64>) -> Vec<f64>,
    {
        self.broadcast(self.reduce(f, value))
    }
}


// ============================================================================
#[cfg(test)]
mod test {
    use super::*;
    use std::thread;

    #[test]
    fn all_reduce_sums_over_every_rank() {
        let comms = LocalCluster::new(5);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let mine = vec![comm.rank() as f64, 1.0];
                    comm.all_reduce(
                        |a, b| a.iter().zip(b.iter()).map(|(x, y)| x + y).collect(),
                        mine,
                    )
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec![10.0, 5.0]);
        }
    }

    #[test]
    fn broadcast_reaches_every_rank() {
        let comms = LocalCluster::new(4);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let value = if comm.rank() == 0 {
                        Some(vec![3.5, -1.0])
                    } else {
                        None
                    };
                    comm.broadcast(value)
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec![3.5, -1.0]);
        }
    }
}
