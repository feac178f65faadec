use super::{Communicator, Message};
use crossbeam_channel::{unbounded, Receiver, Sender};


/**
 * An in-process rank group over a crossbeam channel mesh: every rank holds a
 * sender to every peer's inbox. Useful for running a multi-rank exchange
 * inside one process, with one thread per rank.
 */
pub struct LocalCluster;


impl LocalCluster {

    /// Create the mesh and hand back one communicator per rank.
    pub fn new(size: usize) -> Vec<LocalCommunicator> {
        assert!(size > 0);
        let (senders, receivers): (Vec<Sender<Message>>, Vec<Receiver<Message>>) =
            (0..size).map(|_| unbounded()).unzip();

        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| LocalCommunicator {
                rank,
                peers: senders.clone(),
                inbox,
            })
            .collect()
    }
}


pub struct LocalCommunicator {
    rank: usize,
    peers: Vec<Sender<Message>>,
    inbox: Receiver<Message>,
}


impl Communicator for LocalCommunicator {

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn send(&self, rank: usize, tag: u16, values: Vec<f64>) {
        self.peers[rank]
            .send(Message {
                source: self.rank,
                tag,
                values,
            })
            .expect("peer rank has hung up");
    }

    fn recv_any(&self) -> Message {
        self.inbox.recv().expect("all peer ranks have hung up")
    }
}
