//! Proof of Work: brute-force nonce search against a pluggable acceptance
//! predicate.
//!
//! The miner increments the nonce and rehashes until the predicate holds.
//! With more than one worker the nonce space is scanned in rounds of
//! contiguous per-worker chunks on a rayon pool; the lowest accepting nonce
//! of the first successful round wins, which is exactly the nonce a
//! sequential search would have found.

use crate::engine::{Consensus, ConsensusError, Result};
use crate::validator::ValidationError;
use hashchain_core::{Block, Hash, HashAlgorithm, Nonce, PowBlock, SealHasher};
use rayon::prelude::*;
use serde_json::json;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that can occur while mining.
#[derive(Debug, Error)]
pub enum MiningError {
    #[error("no accepting nonce after {iterations} hashes in {elapsed:?}")]
    Timeout { iterations: u64, elapsed: Duration },

    #[error("nonce space exhausted")]
    NonceSpaceExhausted,

    #[error("failed to start mining workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Test deciding whether a block hash is acceptable.
pub trait AcceptancePredicate: Send + Sync {
    fn accepts(&self, hash: &Hash) -> bool;

    /// Human readable form for logs and reports.
    fn describe(&self) -> String;
}

/// Hash must start with `n` zero hex symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadingZeros(pub usize);

impl AcceptancePredicate for LeadingZeros {
    fn accepts(&self, hash: &Hash) -> bool {
        hash.leading_zero_nibbles() >= self.0
    }

    fn describe(&self) -> String {
        format!("{} leading zeros", self.0)
    }
}

/// Hex symbol at `position` must equal `symbol`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolAt {
    pub position: usize,
    pub symbol: char,
}

impl SymbolAt {
    /// Third hex symbol equal to `3`.
    pub const THIRD_IS_THREE: Self = Self {
        position: 2,
        symbol: '3',
    };
}

impl AcceptancePredicate for SymbolAt {
    fn accepts(&self, hash: &Hash) -> bool {
        hash.hex_symbol(self.position) == Some(self.symbol.to_ascii_lowercase())
    }

    fn describe(&self) -> String {
        format!("symbol '{}' at position {}", self.symbol, self.position)
    }
}

/// Mining configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinerConfig {
    /// Number of parallel workers (1 = sequential search).
    pub workers: usize,
    /// Nonces each worker scans per round in parallel mode.
    pub batch_size: u64,
    /// Give up after this many hashes. Parallel workers check the cap before
    /// every hash, so the total may exceed it by at most `workers - 1`.
    pub max_iterations: Option<u64>,
    /// Give up after this much wall-clock time.
    pub deadline: Option<Duration>,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            batch_size: 4096,
            max_iterations: None,
            deadline: None,
        }
    }
}

/// Outcome of a successful search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiningReport {
    /// Winning nonce.
    pub nonce: u64,
    /// Hash of the block with the winning nonce.
    pub hash: Hash,
    /// Nonce increments from the starting nonce to the winner.
    pub iterations: u64,
    /// Hashes actually computed, including work discarded by parallel workers.
    pub hashes_computed: u64,
    pub elapsed: Duration,
    pub workers: usize,
}

/// Nonce searcher.
pub struct Miner {
    config: MinerConfig,
    pool: Option<rayon::ThreadPool>,
}

impl Miner {
    /// Create a miner. A worker pool is started when `workers > 1`.
    pub fn new(config: MinerConfig) -> std::result::Result<Self, MiningError> {
        let pool = if config.workers > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.workers)
                    .thread_name(|i| format!("miner-{i}"))
                    .build()?,
            )
        } else {
            None
        };
        Ok(Self { config, pool })
    }

    /// Single-threaded miner without limits.
    pub fn sequential() -> Self {
        Self {
            config: MinerConfig::default(),
            pool: None,
        }
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    /// Search for a nonce whose block hash satisfies `predicate`, starting
    /// from the block's current nonce.
    ///
    /// On success the block's nonce and hash are updated. On failure the
    /// block is left untouched.
    #[tracing::instrument(skip_all, fields(index = block.index, predicate = %predicate.describe()))]
    pub fn mine(
        &self,
        block: &mut PowBlock,
        predicate: &dyn AcceptancePredicate,
        algorithm: HashAlgorithm,
    ) -> std::result::Result<MiningReport, MiningError> {
        let start = Instant::now();
        let hasher = block.seal_hasher(algorithm);
        let start_nonce = block.seal.0;

        tracing::debug!(workers = self.config.workers, start_nonce, "starting nonce search");

        let (nonce, hash, hashes_computed) = match &self.pool {
            Some(pool) => {
                pool.install(|| self.search_parallel(&hasher, predicate, start_nonce, start))?
            }
            None => self.search_sequential(&hasher, predicate, start_nonce, start)?,
        };

        block.seal = Nonce(nonce);
        block.hash = hash;

        let report = MiningReport {
            nonce,
            hash,
            iterations: nonce - start_nonce,
            hashes_computed,
            elapsed: start.elapsed(),
            workers: self.config.workers.max(1),
        };
        tracing::debug!(
            nonce,
            iterations = report.iterations,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "block mined: {}",
            hash
        );
        Ok(report)
    }

    fn limit_reached(&self, hashes: u64, start: Instant) -> bool {
        self.config.max_iterations.is_some_and(|cap| hashes >= cap)
            || self.config.deadline.is_some_and(|deadline| start.elapsed() >= deadline)
    }

    fn timeout(hashes: u64, start: Instant) -> MiningError {
        let elapsed = start.elapsed();
        tracing::warn!(hashes, ?elapsed, "mining gave up");
        MiningError::Timeout {
            iterations: hashes,
            elapsed,
        }
    }

    fn search_sequential(
        &self,
        hasher: &SealHasher,
        predicate: &dyn AcceptancePredicate,
        start_nonce: u64,
        start: Instant,
    ) -> std::result::Result<(u64, Hash, u64), MiningError> {
        let mut nonce = start_nonce;
        let mut hash = hasher.hash(&Nonce(nonce));
        let mut hashes = 1u64;

        while !predicate.accepts(&hash) {
            if self.limit_reached(hashes, start) {
                return Err(Self::timeout(hashes, start));
            }
            nonce = nonce.checked_add(1).ok_or(MiningError::NonceSpaceExhausted)?;
            hash = hasher.hash(&Nonce(nonce));
            hashes += 1;
        }

        Ok((nonce, hash, hashes))
    }

    fn search_parallel(
        &self,
        hasher: &SealHasher,
        predicate: &dyn AcceptancePredicate,
        start_nonce: u64,
        start: Instant,
    ) -> std::result::Result<(u64, Hash, u64), MiningError> {
        let workers = self.config.workers as u64;
        let batch = self.config.batch_size.max(1);
        let hashes = AtomicU64::new(0);
        let mut base = start_nonce;

        loop {
            // Lowest accepting nonce seen this round; chunks above it stop early.
            let best = AtomicU64::new(u64::MAX);
            // Set once any worker stops on the cap or deadline.
            let cut = AtomicBool::new(false);

            let found = (0..workers)
                .into_par_iter()
                .filter_map(|worker| {
                    let lo = worker.checked_mul(batch).and_then(|offset| base.checked_add(offset))?;
                    let hi = lo.saturating_add(batch);

                    for nonce in lo..hi {
                        if nonce > best.load(Ordering::Relaxed) {
                            break;
                        }
                        if self.limit_reached(hashes.load(Ordering::Relaxed), start) {
                            cut.store(true, Ordering::Relaxed);
                            break;
                        }
                        let hash = hasher.hash(&Nonce(nonce));
                        hashes.fetch_add(1, Ordering::Relaxed);
                        if predicate.accepts(&hash) {
                            best.fetch_min(nonce, Ordering::Relaxed);
                            return Some((nonce, hash));
                        }
                    }
                    None
                })
                .min_by_key(|(nonce, _)| *nonce);

            let total = hashes.load(Ordering::Relaxed);
            // A cut chunk may hide a lower accepting nonce.
            if cut.load(Ordering::Relaxed) {
                return Err(Self::timeout(total, start));
            }
            if let Some((nonce, hash)) = found {
                return Ok((nonce, hash, total));
            }
            base = workers
                .checked_mul(batch)
                .and_then(|step| base.checked_add(step))
                .ok_or(MiningError::NonceSpaceExhausted)?;
        }
    }
}

impl fmt::Debug for Miner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Miner").field("config", &self.config).finish()
    }
}

/// Proof of Work configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowConfig {
    /// Required leading zero hex symbols for every non-genesis block.
    pub difficulty: usize,
    pub miner: MinerConfig,
}

impl Default for PowConfig {
    fn default() -> Self {
        Self {
            difficulty: 3,
            miner: MinerConfig::default(),
        }
    }
}

impl PowConfig {
    pub fn new(difficulty: usize) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }
}

/// Proof of Work acceptance: blocks are mined until their hash has
/// `difficulty` leading zeros.
#[derive(Debug)]
pub struct ProofOfWork {
    difficulty: usize,
    miner: Miner,
}

impl ProofOfWork {
    pub fn new(config: PowConfig) -> Result<Self> {
        check_difficulty(config.difficulty)?;
        Ok(Self {
            difficulty: config.difficulty,
            miner: Miner::new(config.miner)?,
        })
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// Change the target used for future mining and validation.
    pub fn set_difficulty(&mut self, difficulty: usize) -> Result<()> {
        check_difficulty(difficulty)?;
        self.difficulty = difficulty;
        Ok(())
    }

    /// The chain's difficulty predicate.
    pub fn predicate(&self) -> LeadingZeros {
        LeadingZeros(self.difficulty)
    }

    pub fn miner(&self) -> &Miner {
        &self.miner
    }

    /// Mine with an arbitrary predicate instead of the difficulty target.
    pub fn mine_with(
        &self,
        candidate: &mut PowBlock,
        predicate: &dyn AcceptancePredicate,
        algorithm: HashAlgorithm,
    ) -> Result<MiningReport> {
        Ok(self.miner.mine(candidate, predicate, algorithm)?)
    }
}

fn check_difficulty(difficulty: usize) -> Result<()> {
    if difficulty == 0 || difficulty > 64 {
        return Err(ConsensusError::InvalidDifficulty(difficulty));
    }
    Ok(())
}

impl Consensus for ProofOfWork {
    type Seal = Nonce;
    type Outcome = MiningReport;

    fn genesis(&self, algorithm: HashAlgorithm) -> PowBlock {
        Block::genesis(json!("Genesis Block"), Nonce(0), algorithm)
    }

    fn seal(&mut self, candidate: &mut PowBlock, algorithm: HashAlgorithm) -> Result<MiningReport> {
        let predicate = self.predicate();
        self.mine_with(candidate, &predicate, algorithm)
    }

    fn verify_acceptance(&self, block: &PowBlock) -> std::result::Result<(), ValidationError> {
        if !self.predicate().accepts(&block.hash) {
            return Err(ValidationError::InsufficientWork {
                index: block.index,
                difficulty: self.difficulty,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALGO: HashAlgorithm = HashAlgorithm::Sha256;

    fn candidate() -> PowBlock {
        Block::new(1, Hash::ZERO, json!({"amount": 4, "from": "A", "to": "B"}), Nonce(0), ALGO)
    }

    #[test]
    fn test_leading_zeros_predicate() {
        let zero = Hash::ZERO;
        assert!(LeadingZeros(64).accepts(&zero));

        let mut bytes = [0xffu8; 32];
        bytes[0] = 0x00;
        bytes[1] = 0x0f;
        let h = Hash(bytes);
        assert!(LeadingZeros(3).accepts(&h));
        assert!(!LeadingZeros(4).accepts(&h));
    }

    #[test]
    fn test_symbol_at_predicate() {
        let mut bytes = [0u8; 32];
        bytes[1] = 0x3a;
        let h = Hash(bytes);
        assert!(SymbolAt::THIRD_IS_THREE.accepts(&h));
        assert!(!SymbolAt { position: 3, symbol: '3' }.accepts(&h));
        assert!(SymbolAt { position: 3, symbol: 'A' }.accepts(&h));
        assert!(!SymbolAt { position: 99, symbol: '0' }.accepts(&h));
    }

    #[test]
    fn test_mine_meets_difficulty() {
        let miner = Miner::sequential();
        let mut block = candidate();
        let report = miner.mine(&mut block, &LeadingZeros(2), ALGO).unwrap();

        assert!(block.hash.to_hex().starts_with("00"));
        assert_eq!(block.seal, Nonce(report.nonce));
        assert_eq!(block.hash, report.hash);
        assert!(block.has_valid_hash(ALGO));
        assert_eq!(report.iterations, report.nonce);
        assert_eq!(report.hashes_computed, report.nonce + 1);
    }

    #[test]
    fn test_mine_alternative_predicate() {
        let miner = Miner::sequential();
        let mut block = candidate();
        miner.mine(&mut block, &SymbolAt::THIRD_IS_THREE, ALGO).unwrap();

        assert_eq!(block.hash.to_hex().chars().nth(2), Some('3'));
        assert!(block.has_valid_hash(ALGO));
    }

    #[test]
    fn test_mine_finds_lowest_nonce() {
        let miner = Miner::sequential();
        let mut block = candidate();
        let hasher = block.seal_hasher(ALGO);
        let report = miner.mine(&mut block, &LeadingZeros(2), ALGO).unwrap();

        for n in 0..report.nonce {
            assert!(!LeadingZeros(2).accepts(&hasher.hash(&Nonce(n))));
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sequential = Miner::sequential();
        let parallel = Miner::new(MinerConfig {
            workers: 4,
            batch_size: 64,
            ..MinerConfig::default()
        })
        .unwrap();

        let mut a = candidate();
        let mut b = a.clone();
        let ra = sequential.mine(&mut a, &LeadingZeros(3), ALGO).unwrap();
        let rb = parallel.mine(&mut b, &LeadingZeros(3), ALGO).unwrap();

        assert_eq!(ra.nonce, rb.nonce);
        assert_eq!(ra.iterations, rb.iterations);
        assert_eq!(a.hash, b.hash);
        assert_eq!(rb.workers, 4);
        assert!(rb.hashes_computed >= rb.iterations);
    }

    #[test]
    fn test_iteration_cap_times_out() {
        let miner = Miner::new(MinerConfig {
            max_iterations: Some(10),
            ..MinerConfig::default()
        })
        .unwrap();
        let mut block = candidate();
        let before = block.clone();

        let err = miner.mine(&mut block, &LeadingZeros(64), ALGO).unwrap_err();
        assert!(matches!(err, MiningError::Timeout { iterations: 10, .. }));
        assert_eq!(block, before);
    }

    #[test]
    fn test_parallel_cap_times_out() {
        let miner = Miner::new(MinerConfig {
            workers: 2,
            batch_size: 16,
            max_iterations: Some(100),
            deadline: None,
        })
        .unwrap();
        let mut block = candidate();
        let before = block.clone();

        let err = miner.mine(&mut block, &LeadingZeros(64), ALGO).unwrap_err();
        match err {
            MiningError::Timeout { iterations, .. } => assert!((100..=101).contains(&iterations)),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(block, before);
    }

    #[test]
    fn test_parallel_cap_stops_inside_round() {
        let miner = Miner::new(MinerConfig {
            workers: 2,
            batch_size: 1 << 20,
            max_iterations: Some(50),
            deadline: None,
        })
        .unwrap();
        let mut block = candidate();

        let err = miner.mine(&mut block, &LeadingZeros(64), ALGO).unwrap_err();
        match err {
            MiningError::Timeout { iterations, .. } => assert!((50..=51).contains(&iterations)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parallel_deadline_stops_inside_round() {
        let miner = Miner::new(MinerConfig {
            workers: 2,
            batch_size: u64::MAX / 4,
            max_iterations: None,
            deadline: Some(Duration::from_millis(20)),
        })
        .unwrap();
        let mut block = candidate();
        let started = Instant::now();

        assert!(matches!(
            miner.mine(&mut block, &LeadingZeros(64), ALGO),
            Err(MiningError::Timeout { .. })
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_huge_batch_does_not_overflow() {
        let miner = Miner::new(MinerConfig {
            workers: 3,
            batch_size: u64::MAX / 2 + 1,
            ..MinerConfig::default()
        })
        .unwrap();
        let mut block = candidate();
        let mut expected = block.clone();

        let report = miner.mine(&mut block, &LeadingZeros(1), ALGO).unwrap();
        let sequential = Miner::sequential().mine(&mut expected, &LeadingZeros(1), ALGO).unwrap();

        assert_eq!(report.nonce, sequential.nonce);
        assert!(LeadingZeros(1).accepts(&block.hash));
        assert!(block.has_valid_hash(ALGO));
    }

    #[test]
    fn test_deadline_times_out() {
        let miner = Miner::new(MinerConfig {
            deadline: Some(Duration::from_millis(20)),
            ..MinerConfig::default()
        })
        .unwrap();
        let mut block = candidate();
        assert!(matches!(
            miner.mine(&mut block, &LeadingZeros(64), ALGO),
            Err(MiningError::Timeout { .. })
        ));
    }

    #[test]
    fn test_difficulty_bounds() {
        assert!(matches!(
            ProofOfWork::new(PowConfig::new(0)),
            Err(ConsensusError::InvalidDifficulty(0))
        ));
        assert!(ProofOfWork::new(PowConfig::new(65)).is_err());

        let mut pow = ProofOfWork::new(PowConfig::new(1)).unwrap();
        assert!(pow.set_difficulty(0).is_err());
        assert_eq!(pow.difficulty(), 1);
        pow.set_difficulty(4).unwrap();
        assert_eq!(pow.predicate(), LeadingZeros(4));
    }

    #[test]
    fn test_pow_seal_and_accept() {
        let mut pow = ProofOfWork::new(PowConfig::new(2)).unwrap();
        let mut block = candidate();
        pow.seal(&mut block, ALGO).unwrap();
        assert!(pow.accepts(&block));

        pow.set_difficulty(64).unwrap();
        assert!(matches!(
            pow.verify_acceptance(&block),
            Err(ValidationError::InsufficientWork { index: 1, difficulty: 64 })
        ));
    }

    #[test]
    fn test_pow_genesis() {
        let pow = ProofOfWork::new(PowConfig::default()).unwrap();
        let genesis = pow.genesis(ALGO);
        assert!(genesis.is_genesis());
        assert_eq!(genesis.payload, json!("Genesis Block"));
        assert_eq!(genesis.seal, Nonce(0));
        assert!(genesis.has_valid_hash(ALGO));
    }
}
