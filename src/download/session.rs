use std::collections::VecDeque;

/// Where a chunk stands within a download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// Waiting to be sent to `peer`
    Pending { peer: usize },
    InFlight { peer: usize },
    Done,
}

#[derive(Debug)]
struct ChunkProgress {
    state: ChunkState,
    /// Peers that already failed this chunk
    failed: Vec<usize>,
}

/// A chunk handed to a fetch task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub index: u32,
    pub peer: usize,
}

/// Per-download scheduling state.
///
/// Chunk `i` starts on peer `i % n`. A failure moves it to the next peer
/// (rotating from the one that failed) that has not yet failed it; once
/// every peer has failed, the chunk is exhausted.
#[derive(Debug)]
pub struct DownloadSession {
    peers: Vec<String>,
    chunks: Vec<ChunkProgress>,
    queue: VecDeque<u32>,
    done: usize,
}

impl DownloadSession {
    pub fn new(peers: Vec<String>, num_chunks: u32) -> Self {
        let n = peers.len().max(1);
        let chunks = (0..num_chunks as usize)
            .map(|i| ChunkProgress {
                state: ChunkState::Pending { peer: i % n },
                failed: Vec::new(),
            })
            .collect();

        Self {
            peers,
            chunks,
            queue: (0..num_chunks).collect(),
            done: 0,
        }
    }

    pub fn peer(&self, peer: usize) -> &str {
        &self.peers[peer]
    }

    #[cfg(test)]
    pub fn state(&self, index: u32) -> Option<ChunkState> {
        self.chunks.get(index as usize).map(|c| c.state)
    }

    /// Index of the chunk `next_assignment` would hand out
    pub fn peek_index(&self) -> Option<u32> {
        self.queue.front().copied()
    }

    /// Take the next pending chunk and mark it in flight
    pub fn next_assignment(&mut self) -> Option<Assignment> {
        let index = self.queue.pop_front()?;
        let chunk = &mut self.chunks[index as usize];

        let ChunkState::Pending { peer } = chunk.state else {
            return None;
        };
        chunk.state = ChunkState::InFlight { peer };

        Some(Assignment { index, peer })
    }

    pub fn record_success(&mut self, index: u32) {
        let chunk = &mut self.chunks[index as usize];
        if chunk.state != ChunkState::Done {
            chunk.state = ChunkState::Done;
            self.done += 1;
        }
    }

    /// Record that `peer` failed chunk `index` and requeue it on the next
    /// untried peer. Returns that peer, or `None` once every peer has failed.
    pub fn record_failure(&mut self, index: u32, peer: usize) -> Option<usize> {
        let n = self.peers.len();
        let chunk = &mut self.chunks[index as usize];

        if !chunk.failed.contains(&peer) {
            chunk.failed.push(peer);
        }

        let next = (1..=n)
            .map(|offset| (peer + offset) % n)
            .find(|candidate| !chunk.failed.contains(candidate))?;

        chunk.state = ChunkState::Pending { peer: next };
        // Retries go first so the in-order writer is not held back
        self.queue.push_front(index);

        Some(next)
    }

    pub fn completed(&self) -> usize {
        self.done
    }

    pub fn is_complete(&self) -> bool {
        self.done == self.chunks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peers(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("10.0.0.{}:5001", i + 1)).collect()
    }

    #[test]
    fn test_round_robin_assignment() {
        let mut session = DownloadSession::new(peers(3), 5);

        let assigned: Vec<usize> = std::iter::from_fn(|| session.next_assignment())
            .map(|a| a.peer)
            .collect();

        assert_eq!(assigned, vec![0, 1, 2, 0, 1]);
        assert_eq!(session.state(4), Some(ChunkState::InFlight { peer: 1 }));
    }

    #[test]
    fn test_failover_rotates_from_failed_peer() {
        let mut session = DownloadSession::new(peers(3), 3);
        let first = session.next_assignment().unwrap();
        assert_eq!(first, Assignment { index: 0, peer: 0 });

        assert_eq!(session.record_failure(0, 0), Some(1));
        // Retry is scheduled ahead of the remaining chunks
        assert_eq!(session.next_assignment(), Some(Assignment { index: 0, peer: 1 }));

        assert_eq!(session.record_failure(0, 1), Some(2));
        assert_eq!(session.next_assignment(), Some(Assignment { index: 0, peer: 2 }));

        assert_eq!(session.record_failure(0, 2), None);
    }

    #[test]
    fn test_failed_peer_stays_eligible_for_other_chunks() {
        let mut session = DownloadSession::new(peers(2), 3);
        session.next_assignment();
        assert_eq!(session.record_failure(0, 0), Some(1));

        let assigned: Vec<Assignment> = std::iter::from_fn(|| session.next_assignment()).collect();
        assert_eq!(
            assigned,
            vec![
                Assignment { index: 0, peer: 1 },
                Assignment { index: 1, peer: 1 },
                Assignment { index: 2, peer: 0 },
            ]
        );
    }

    #[test]
    fn test_peek_matches_next_assignment() {
        let mut session = DownloadSession::new(peers(2), 3);
        assert_eq!(session.peek_index(), Some(0));

        session.next_assignment();
        session.next_assignment();
        session.record_failure(0, 0);
        assert_eq!(session.peek_index(), Some(0));
        assert_eq!(session.next_assignment().map(|a| a.index), Some(0));
        assert_eq!(session.peek_index(), Some(2));

        session.next_assignment();
        assert_eq!(session.peek_index(), None);
    }

    #[test]
    fn test_single_peer_exhausts_immediately() {
        let mut session = DownloadSession::new(peers(1), 1);
        session.next_assignment();
        assert_eq!(session.record_failure(0, 0), None);
    }

    #[test]
    fn test_completion() {
        let mut session = DownloadSession::new(peers(2), 2);
        assert!(!session.is_complete());

        session.record_success(0);
        session.record_success(0);
        assert_eq!(session.completed(), 1);

        session.record_success(1);
        assert!(session.is_complete());
        assert!(DownloadSession::new(peers(2), 0).is_complete());
    }
}
