//! Finds the converted preview object for an original document key.
//!
//! Four phases run strictly in order, cheapest first, and any of them may end
//! the resolution:
//!
//! 1. direct: exact structural rewrites of the original key, existence-checked
//! 2. scoped: one bounded listing of the matching folder under the converted root
//! 3. secondary direct: the flat legacy folder
//! 4. broad: paginated scans of the routed category/server prefixes
//!
//! Per-call store failures are logged and absorbed. They only surface as
//! [`ResolveError::StoreUnavailable`] when every phase that reached the store
//! failed, or when the store is unreachable during the direct phase.

use crate::config::ResolverConfig;
use crate::models::{CandidateObject, NormalizedTarget, Phase, ResolutionResult, ScoredCandidate};
use crate::normalizer::{parent_folder, replace_extension, KeyNormalizer};
use crate::routing::{parse_partition, Partition};
use crate::scorer::{SimilarityScorer, SCORE_EXACT};
use crate::traits::ObjectStore;
use crate::ResolveError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A candidate at or above this score ends the search immediately.
pub const HIGH_CONFIDENCE_SCORE: u8 = 95;

/// Lowest score a broad-search candidate may be accepted with.
pub const ACCEPTANCE_FLOOR: u8 = 60;

#[derive(Debug)]
enum PhaseOutcome {
    Hit(ResolutionResult),
    Continue,
    Exhausted,
}

#[derive(Debug, Default, Clone, Copy)]
struct PhaseCalls {
    issued: usize,
    failed: usize,
}

/// Store calls issued and failed, per phase.
#[derive(Debug, Default)]
struct CallLedger {
    phases: [PhaseCalls; 4],
}

impl CallLedger {
    fn slot(phase: Phase) -> usize {
        match phase {
            Phase::Direct => 0,
            Phase::Scoped => 1,
            Phase::SecondaryDirect => 2,
            Phase::Broad => 3,
        }
    }

    fn record(&mut self, phase: Phase, succeeded: bool) {
        let calls = &mut self.phases[Self::slot(phase)];
        calls.issued += 1;
        if !succeeded {
            calls.failed += 1;
        }
    }

    /// Every phase that reached the store saw nothing but failures.
    fn all_failed(&self) -> bool {
        let mut touched = self.phases.iter().filter(|calls| calls.issued > 0).peekable();
        touched.peek().is_some() && touched.all(|calls| calls.failed == calls.issued)
    }
}

struct Resolution<'a> {
    relative_key: &'a str,
    target: NormalizedTarget,
    partition: Option<Partition>,
    ledger: CallLedger,
    cancel: &'a CancellationToken,
}

/// Best-so-far across one prefix scan. Ties keep the first candidate seen.
#[derive(Debug, Default)]
struct ScanState {
    best: Option<ScoredCandidate>,
    scanned: usize,
    calls: usize,
}

impl ScanState {
    fn consider(mut self, candidate: ScoredCandidate) -> Self {
        let better = self
            .best
            .as_ref()
            .map_or(true, |best| candidate.score > best.score);
        if better {
            self.best = Some(candidate);
        }
        self
    }

    fn best_score(&self) -> u8 {
        self.best.as_ref().map_or(0, |best| best.score)
    }
}

pub struct CandidateLocator<S>
where
    S: ObjectStore,
{
    store: S,
    config: ResolverConfig,
    normalizer: KeyNormalizer,
    scorer: SimilarityScorer,
}

impl<S> CandidateLocator<S>
where
    S: ObjectStore,
{
    pub fn new(store: S, config: ResolverConfig) -> Self {
        Self {
            normalizer: config.normalizer(),
            scorer: config.scorer(),
            store,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &KeyNormalizer {
        &self.normalizer
    }

    pub fn scorer(&self) -> &SimilarityScorer {
        &self.scorer
    }

    pub async fn resolve(&self, original_key: &str) -> Result<ResolutionResult, ResolveError> {
        self.resolve_with_cancel(original_key, &CancellationToken::new())
            .await
    }

    /// Like [`resolve`](Self::resolve), but stops issuing store calls once
    /// `cancel` fires and reports the document as not found.
    pub async fn resolve_with_cancel(
        &self,
        original_key: &str,
        cancel: &CancellationToken,
    ) -> Result<ResolutionResult, ResolveError> {
        let relative_key = self.normalizer.strip_routing_prefixes(original_key);
        let categories: Vec<&str> = self.config.routing.categories().collect();
        let mut resolution = Resolution {
            relative_key,
            target: self.normalizer.normalize(original_key),
            partition: parse_partition(relative_key, &categories),
            ledger: CallLedger::default(),
            cancel,
        };

        if resolution.target.base_name.is_empty() {
            debug!(original_key, "original key has no file name");
            return Ok(ResolutionResult::not_found());
        }

        debug!(
            original_key,
            base_name = %resolution.target.base_name,
            project_folder = ?resolution.target.project_folder,
            subdirectory = ?resolution.target.subdirectory,
            "resolving preview"
        );

        for phase in [Phase::Direct, Phase::Scoped, Phase::SecondaryDirect, Phase::Broad] {
            if cancel.is_cancelled() {
                break;
            }
            let outcome = match phase {
                Phase::Direct => self.direct_phase(&mut resolution).await?,
                Phase::Scoped => self.scoped_phase(&mut resolution).await,
                Phase::SecondaryDirect => self.secondary_phase(&mut resolution).await,
                Phase::Broad => self.broad_phase(&mut resolution).await,
            };
            match outcome {
                PhaseOutcome::Hit(result) => {
                    info!(
                        original_key,
                        phase = %phase,
                        object_key = ?result.object_key,
                        score = ?result.score,
                        "preview resolved"
                    );
                    return Ok(result);
                }
                PhaseOutcome::Continue => continue,
                PhaseOutcome::Exhausted => break,
            }
        }

        if cancel.is_cancelled() {
            debug!(original_key, "resolution cancelled");
            return Ok(ResolutionResult::not_found());
        }

        if resolution.ledger.all_failed() {
            return Err(ResolveError::StoreUnavailable(format!(
                "every lookup for {original_key} failed"
            )));
        }

        debug!(original_key, "no preview found");
        Ok(ResolutionResult::not_found())
    }

    /// Keys the converter would have produced had it kept the original path.
    pub fn direct_keys(&self, relative_key: &str) -> Vec<String> {
        if relative_key.is_empty() {
            return Vec::new();
        }
        let ext = &self.config.preview_extension;
        let mut keys = Vec::with_capacity(2);
        for root in [&self.config.originals_root, &self.config.converted_root] {
            let key = replace_extension(
                &format!("{}/{relative_key}", root.trim_end_matches('/')),
                ext,
            );
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Folders listed by the scoped phase: the document's own folder under
    /// the converted root, then its `{project}/{subdirectory}` folder when
    /// the document sits deeper than that.
    pub fn scoped_prefixes(&self, relative_key: &str, target: &NormalizedTarget) -> Vec<String> {
        let root = self.config.converted_root.trim_end_matches('/');
        let mut prefixes = Vec::new();

        if let Some(folder) = parent_folder(relative_key) {
            prefixes.push(format!("{root}/{folder}"));
        }

        if let (Some(project), Some(subdirectory)) = (&target.project_folder, &target.subdirectory) {
            let segments: Vec<&str> = relative_key.split('/').filter(|s| !s.is_empty()).collect();
            let anchor = segments
                .windows(2)
                .position(|pair| pair[0] == project.as_str() && pair[1] == subdirectory.as_str());
            if let Some(index) = anchor {
                let folder = format!("{root}/{}/", segments[..index + 2].join("/"));
                if !prefixes.contains(&folder) {
                    prefixes.push(folder);
                }
            }
        }

        prefixes
    }

    pub fn secondary_key(&self, target: &NormalizedTarget) -> String {
        format!(
            "{}/{}.{}",
            self.config.legacy_converted_root.trim_end_matches('/'),
            target.base_name,
            self.config.preview_extension
        )
    }

    pub fn broad_prefixes(&self, relative_key: &str) -> Vec<String> {
        let categories: Vec<&str> = self.config.routing.categories().collect();
        let partition = parse_partition(relative_key, &categories);
        self.config
            .routing
            .coarse_prefixes(&self.config.converted_root, partition.as_ref())
    }

    async fn direct_phase(
        &self,
        resolution: &mut Resolution<'_>,
    ) -> Result<PhaseOutcome, ResolveError> {
        for key in self.direct_keys(resolution.relative_key) {
            if resolution.cancel.is_cancelled() {
                return Ok(PhaseOutcome::Exhausted);
            }
            match self.store.exists(&key).await {
                Ok(true) => {
                    resolution.ledger.record(Phase::Direct, true);
                    return Ok(PhaseOutcome::Hit(ResolutionResult::hit(
                        Phase::Direct,
                        key,
                        SCORE_EXACT,
                    )));
                }
                Ok(false) => resolution.ledger.record(Phase::Direct, true),
                Err(error) if error.is_unreachable() => {
                    warn!(key = %key, error = %error, "object store unreachable");
                    return Err(ResolveError::StoreUnavailable(error.to_string()));
                }
                Err(error) => {
                    resolution.ledger.record(Phase::Direct, false);
                    warn!(phase = %Phase::Direct, key = %key, error = %error, "existence check failed");
                }
            }
        }
        Ok(PhaseOutcome::Continue)
    }

    async fn scoped_phase(&self, resolution: &mut Resolution<'_>) -> PhaseOutcome {
        let prefixes = self.scoped_prefixes(resolution.relative_key, &resolution.target);

        for prefix in prefixes {
            if resolution.cancel.is_cancelled() {
                return PhaseOutcome::Exhausted;
            }
            let page = match self
                .store
                .list_by_prefix(&prefix, self.config.scoped_page_size, None)
                .await
            {
                Ok(page) => {
                    resolution.ledger.record(Phase::Scoped, true);
                    page
                }
                Err(error) => {
                    resolution.ledger.record(Phase::Scoped, false);
                    warn!(phase = %Phase::Scoped, prefix = %prefix, error = %error, "listing failed");
                    continue;
                }
            };

            debug!(prefix = %prefix, objects = page.items.len(), "scoped listing");
            let state = page
                .items
                .into_iter()
                .filter_map(|item| self.score_key(item.key, &resolution.target))
                .fold(ScanState::default(), ScanState::consider);

            if let Some(best) = state.best.filter(|best| best.score >= HIGH_CONFIDENCE_SCORE) {
                return PhaseOutcome::Hit(ResolutionResult::hit(
                    Phase::Scoped,
                    best.candidate.key,
                    best.score,
                ));
            }
        }
        PhaseOutcome::Continue
    }

    async fn secondary_phase(&self, resolution: &mut Resolution<'_>) -> PhaseOutcome {
        let key = self.secondary_key(&resolution.target);
        match self.store.exists(&key).await {
            Ok(true) => {
                resolution.ledger.record(Phase::SecondaryDirect, true);
                PhaseOutcome::Hit(ResolutionResult::hit(Phase::SecondaryDirect, key, SCORE_EXACT))
            }
            Ok(false) => {
                resolution.ledger.record(Phase::SecondaryDirect, true);
                PhaseOutcome::Continue
            }
            Err(error) => {
                resolution.ledger.record(Phase::SecondaryDirect, false);
                warn!(phase = %Phase::SecondaryDirect, key = %key, error = %error, "existence check failed");
                PhaseOutcome::Continue
            }
        }
    }

    async fn broad_phase(&self, resolution: &mut Resolution<'_>) -> PhaseOutcome {
        let prefixes = self
            .config
            .routing
            .coarse_prefixes(&self.config.converted_root, resolution.partition.as_ref());

        for prefix in prefixes {
            if resolution.cancel.is_cancelled() {
                return PhaseOutcome::Exhausted;
            }

            let state = self.scan_prefix(&prefix, resolution).await;
            if resolution.cancel.is_cancelled() {
                return PhaseOutcome::Exhausted;
            }
            debug!(
                prefix = %prefix,
                scanned = state.scanned,
                calls = state.calls,
                best_score = state.best_score(),
                "broad scan finished"
            );

            if let Some(best) = state.best.filter(|best| best.score >= ACCEPTANCE_FLOOR) {
                return PhaseOutcome::Hit(ResolutionResult::hit(
                    Phase::Broad,
                    best.candidate.key,
                    best.score,
                ));
            }
        }
        PhaseOutcome::Exhausted
    }

    /// Pages through `prefix` until the scan cap, the last page, or a
    /// high-confidence candidate.
    async fn scan_prefix(&self, prefix: &str, resolution: &mut Resolution<'_>) -> ScanState {
        let cap = self.config.max_objects_per_prefix;
        let mut state = ScanState::default();
        let mut token: Option<String> = None;

        while state.scanned < cap {
            if resolution.cancel.is_cancelled() {
                break;
            }
            let page_size = self.config.broad_page_size.min(cap - state.scanned);
            let page = match self
                .store
                .list_by_prefix(prefix, page_size, token.as_deref())
                .await
            {
                Ok(page) => {
                    resolution.ledger.record(Phase::Broad, true);
                    page
                }
                Err(error) => {
                    resolution.ledger.record(Phase::Broad, false);
                    warn!(phase = %Phase::Broad, prefix = %prefix, error = %error, "listing failed");
                    break;
                }
            };

            state.calls += 1;
            if page.items.is_empty() {
                break;
            }
            state.scanned += page.items.len();
            state = page
                .items
                .into_iter()
                .filter_map(|item| self.score_key(item.key, &resolution.target))
                .fold(state, ScanState::consider);

            if state.best_score() >= HIGH_CONFIDENCE_SCORE {
                break;
            }
            token = match page.next_token {
                Some(next) if !next.is_empty() => Some(next),
                _ => break,
            };
        }
        state
    }

    /// Scores `key` when it names a preview object.
    fn score_key(&self, key: String, target: &NormalizedTarget) -> Option<ScoredCandidate> {
        let candidate = CandidateObject::from_key(key);
        if !self.is_preview_file(&candidate.file_name) {
            return None;
        }
        let score = self.scorer.score(&candidate.file_name, &target.base_name);
        Some(ScoredCandidate { candidate, score })
    }

    fn is_preview_file(&self, file_name: &str) -> bool {
        file_name
            .rsplit_once('.')
            .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(&self.config.preview_extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListPage;
    use crate::StoreError;
    use crate::stores::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy)]
    enum Failure {
        Transient,
        Unreachable,
    }

    /// Memory store with scripted listings, injectable failures and a call log.
    #[derive(Default)]
    struct ScriptedStore {
        inner: MemoryStore,
        scripted: HashMap<String, Vec<String>>,
        failure: Option<Failure>,
        failing_prefixes: Vec<String>,
        cancel_on_list: Option<(String, CancellationToken)>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedStore {
        fn with_keys<K: Into<String>>(keys: impl IntoIterator<Item = K>) -> Self {
            Self {
                inner: MemoryStore::from_keys(keys),
                ..Self::default()
            }
        }

        fn failing(failure: Failure) -> Self {
            Self {
                failure: Some(failure),
                ..Self::default()
            }
        }

        fn log(&self, entry: String) {
            self.calls.lock().unwrap().push(entry);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn list_calls_for(&self, prefix: &str) -> usize {
            let wanted = format!("list:{prefix}");
            self.calls().iter().filter(|call| **call == wanted).count()
        }

        fn fail(&self) -> Result<(), StoreError> {
            match self.failure {
                Some(Failure::Transient) => Err(StoreError::Request("throttled".to_string())),
                Some(Failure::Unreachable) => {
                    Err(StoreError::Unreachable("connection refused".to_string()))
                }
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl ObjectStore for ScriptedStore {
        async fn exists(&self, key: &str) -> Result<bool, StoreError> {
            self.log(format!("exists:{key}"));
            self.fail()?;
            self.inner.exists(key).await
        }

        async fn list_by_prefix(
            &self,
            prefix: &str,
            page_size: usize,
            continuation_token: Option<&str>,
        ) -> Result<ListPage, StoreError> {
            self.log(format!("list:{prefix}"));
            self.fail()?;
            if let Some((_, cancel)) = self.cancel_on_list.as_ref().filter(|(on, _)| on == prefix) {
                cancel.cancel();
            }
            if self.failing_prefixes.iter().any(|failing| failing == prefix) {
                return Err(StoreError::Request("prefix throttled".to_string()));
            }
            if let Some(keys) = self.scripted.get(prefix) {
                return Ok(ListPage {
                    items: keys
                        .iter()
                        .map(|key| crate::models::ListedObject {
                            key: key.clone(),
                            size: 1,
                        })
                        .collect(),
                    next_token: None,
                });
            }
            self.inner
                .list_by_prefix(prefix, page_size, continuation_token)
                .await
        }

        async fn read_reference(&self, key: &str, ttl_secs: u64) -> Result<String, StoreError> {
            self.inner.read_reference(key, ttl_secs).await
        }
    }

    const ROAD_PREFIX: &str = "docuworks-converted/road/ts-server3/";
    const STRUCTURE_PREFIX: &str = "docuworks-converted/structure/ts-server7/";

    fn locator(store: ScriptedStore) -> CandidateLocator<ScriptedStore> {
        CandidateLocator::new(store, ResolverConfig::default())
    }

    #[tokio::test]
    async fn direct_rewrite_wins_without_listing() -> Result<(), ResolveError> {
        let store = ScriptedStore::with_keys([
            "docuworks-converted/road/ts-server3/R06_JOB/図面/plan.pdf",
        ]);
        let locator = locator(store);

        let result = locator
            .resolve("documents/road/ts-server3/R06_JOB/図面/plan.xdw")
            .await?;

        assert!(result.found);
        assert_eq!(result.phase, Some(Phase::Direct));
        assert_eq!(
            result.object_key.as_deref(),
            Some("docuworks-converted/road/ts-server3/R06_JOB/図面/plan.pdf")
        );
        assert!(locator.store().calls().iter().all(|call| call.starts_with("exists:")));
        Ok(())
    }

    #[tokio::test]
    async fn scoped_listing_short_circuits_on_high_confidence() -> Result<(), ResolveError> {
        let converted =
            "docuworks-converted/structure/ts-server7/2026/01/19/084228_ts-server7_file_20260114115628.pdf";
        let mut store = ScriptedStore::default();
        store.scripted.insert(
            "docuworks-converted/structure/ts-server7/H22_JOB/報告書/".to_string(),
            vec![converted.to_string()],
        );
        let locator = locator(store);

        let result = locator
            .resolve("documents/structure/ts-server7/H22_JOB/報告書/file.xdw")
            .await?;

        assert!(result.found);
        assert_eq!(result.phase, Some(Phase::Scoped));
        assert_eq!(result.object_key.as_deref(), Some(converted));
        assert!(result.score.unwrap_or_default() >= HIGH_CONFIDENCE_SCORE);

        let calls = locator.store().calls();
        assert!(!calls.iter().any(|call| call.starts_with("exists:converted-pdf/")));
        assert_eq!(locator.store().list_calls_for(STRUCTURE_PREFIX), 0);
        assert_eq!(calls.len(), 3, "two existence checks and one listing: {calls:?}");
        Ok(())
    }

    #[tokio::test]
    async fn legacy_folder_is_checked_before_broad_search() -> Result<(), ResolveError> {
        let store = ScriptedStore::with_keys(["converted-pdf/台帳.pdf"]);
        let locator = locator(store);

        let result = locator.resolve("documents/road/ts-server3/R06_JOB/台帳.xdw").await?;

        assert_eq!(result.phase, Some(Phase::SecondaryDirect));
        assert_eq!(result.object_key.as_deref(), Some("converted-pdf/台帳.pdf"));
        assert_eq!(locator.store().list_calls_for(ROAD_PREFIX), 0);
        Ok(())
    }

    #[tokio::test]
    async fn broad_search_routes_to_the_physical_server() -> Result<(), ResolveError> {
        let converted = "docuworks-converted/road/ts-server3/2025/12/26/200428_ts-server5_舗装計画書_20251226200428.pdf";
        let store = ScriptedStore::with_keys([converted]);
        let locator = locator(store);

        let result = locator
            .resolve("documents/road/ts-server5/R06_JOB/設計/舗装計画書.xdw")
            .await?;

        assert_eq!(result.phase, Some(Phase::Broad));
        assert_eq!(result.object_key.as_deref(), Some(converted));
        assert_eq!(locator.store().list_calls_for(STRUCTURE_PREFIX), 0);
        Ok(())
    }

    #[tokio::test]
    async fn broad_search_accepts_the_best_candidate_above_the_floor() -> Result<(), ResolveError> {
        let weaker = "docuworks-converted/road/ts-server3/2025/01/01/101010_ts-server3_inspection-report_20250101101010.pdf";
        let store = ScriptedStore::with_keys([
            weaker,
            "docuworks-converted/road/ts-server3/2025/01/02/101010_ts-server3_unrelated_20250102101010.pdf",
        ]);
        let locator = locator(store);

        let result = locator
            .resolve("documents/road/ts-server3/R06_JOB/bridge-inspection-report.xdw")
            .await?;

        assert_eq!(result.phase, Some(Phase::Broad));
        assert_eq!(result.object_key.as_deref(), Some(weaker));
        let score = result.score.unwrap_or_default();
        assert!((ACCEPTANCE_FLOOR..HIGH_CONFIDENCE_SCORE).contains(&score), "score={score}");
        Ok(())
    }

    #[tokio::test]
    async fn candidates_below_the_floor_are_never_accepted() -> Result<(), ResolveError> {
        let store = ScriptedStore::with_keys([
            "docuworks-converted/road/ts-server3/2025/01/01/101010_ts-server3_abcdefWXYZ_20250101101010.pdf",
        ]);
        let locator = locator(store);

        let result = locator
            .resolve("documents/road/ts-server3/R06_JOB/abcdefQRST.xdw")
            .await?;

        assert!(!result.found);
        assert_eq!(result.object_key, None);
        Ok(())
    }

    #[tokio::test]
    async fn unmatched_name_exhausts_every_routed_prefix() -> Result<(), ResolveError> {
        let store = ScriptedStore::with_keys([
            "docuworks-converted/road/ts-server3/2025/12/26/101010_ts-server3_道路台帳_20251226101010.pdf",
            "docuworks-converted/structure/ts-server7/2026/01/19/084228_ts-server7_数量計算書_20260119084228.pdf",
        ]);
        let locator = locator(store);

        let result = locator.resolve("unrelated-report.xdw").await?;

        assert!(!result.found);
        assert_eq!(locator.store().list_calls_for(ROAD_PREFIX), 1);
        assert_eq!(locator.store().list_calls_for(STRUCTURE_PREFIX), 1);
        Ok(())
    }

    #[tokio::test]
    async fn broad_scan_is_capped_per_prefix() -> Result<(), ResolveError> {
        let keys = (0..2_500).map(|i| {
            format!("{ROAD_PREFIX}2025/01/01/101010_ts-server3_unmatched{i:05}_20250101101010.pdf")
        });
        let config = ResolverConfig {
            broad_page_size: 100,
            max_objects_per_prefix: 1_000,
            ..ResolverConfig::default()
        };
        let locator = CandidateLocator::new(ScriptedStore::with_keys(keys), config);

        let result = locator
            .resolve("documents/road/ts-server3/R06_JOB/abcdefQRST.xdw")
            .await?;

        assert!(!result.found);
        assert_eq!(locator.store().list_calls_for(ROAD_PREFIX), 10);
        Ok(())
    }

    #[tokio::test]
    async fn high_confidence_hit_stops_pagination() -> Result<(), ResolveError> {
        let exact = format!("{ROAD_PREFIX}2025/01/01/000000_ts-server3_橋梁点検_20250101000000.pdf");
        let mut keys: Vec<String> = (0..300)
            .map(|i| format!("{ROAD_PREFIX}2025/01/02/101010_ts-server3_other{i:03}_20250102101010.pdf"))
            .collect();
        keys.push(exact.clone());
        let config = ResolverConfig {
            broad_page_size: 100,
            ..ResolverConfig::default()
        };
        let locator = CandidateLocator::new(ScriptedStore::with_keys(keys), config);

        let result = locator.resolve("documents/road/ts-server3/R06_JOB/橋梁点検.xdw").await?;

        assert_eq!(result.object_key.as_deref(), Some(exact.as_str()));
        assert_eq!(result.score, Some(SCORE_EXACT));
        assert_eq!(locator.store().list_calls_for(ROAD_PREFIX), 1);
        Ok(())
    }

    #[tokio::test]
    async fn ties_keep_the_first_listed_candidate() -> Result<(), ResolveError> {
        let first = format!("{ROAD_PREFIX}2025/01/01/101010_ts-server3_inspection-report_20250101101010.pdf");
        let second = format!("{ROAD_PREFIX}2025/01/02/101010_ts-server3_inspection-report_20250102101010.pdf");
        let locator = locator(ScriptedStore::with_keys([second.clone(), first.clone()]));

        let result = locator
            .resolve("documents/road/ts-server3/R06_JOB/bridge-inspection-report.xdw")
            .await?;

        assert_eq!(result.object_key.as_deref(), Some(first.as_str()));
        Ok(())
    }

    #[tokio::test]
    async fn transient_failure_everywhere_is_store_unavailable() {
        let locator = locator(ScriptedStore::failing(Failure::Transient));

        let result = locator
            .resolve("documents/structure/ts-server7/H22_JOB/報告書/file.xdw")
            .await;

        assert!(matches!(result, Err(ResolveError::StoreUnavailable(_))));
        let calls = locator.store().calls();
        assert!(calls.iter().any(|call| call == &format!("list:{STRUCTURE_PREFIX}")));
    }

    #[tokio::test]
    async fn unreachable_store_fails_fast_in_the_direct_phase() {
        let locator = locator(ScriptedStore::failing(Failure::Unreachable));

        let result = locator
            .resolve("documents/structure/ts-server7/H22_JOB/報告書/file.xdw")
            .await;

        assert!(matches!(result, Err(ResolveError::StoreUnavailable(_))));
        assert_eq!(locator.store().calls().len(), 1);
    }

    #[tokio::test]
    async fn one_failing_prefix_is_absorbed() -> Result<(), ResolveError> {
        let mut store = ScriptedStore::default();
        store.failing_prefixes.push(ROAD_PREFIX.to_string());
        let locator = locator(store);

        let result = locator.resolve("documents/road/ts-server3/R06_JOB/台帳.xdw").await?;

        assert!(!result.found);
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_resolution_reports_not_found_without_store_calls() -> Result<(), ResolveError> {
        let locator = locator(ScriptedStore::failing(Failure::Transient));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = locator
            .resolve_with_cancel("documents/road/ts-server3/R06_JOB/台帳.xdw", &cancel)
            .await?;

        assert!(!result.found);
        assert!(locator.store().calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn cancellation_mid_pagination_stops_listing() -> Result<(), ResolveError> {
        let cancel = CancellationToken::new();
        let keys = (0..300).map(|i| {
            format!("{ROAD_PREFIX}2025/01/01/101010_ts-server3_unmatched{i:03}_20250101101010.pdf")
        });
        let mut store = ScriptedStore::with_keys(keys);
        store.cancel_on_list = Some((ROAD_PREFIX.to_string(), cancel.clone()));
        let config = ResolverConfig {
            broad_page_size: 100,
            ..ResolverConfig::default()
        };
        let locator = CandidateLocator::new(store, config);

        let result = locator
            .resolve_with_cancel("documents/road/ts-server3/R06_JOB/abcdefQRST.xdw", &cancel)
            .await?;

        assert!(!result.found);
        assert_eq!(locator.store().list_calls_for(ROAD_PREFIX), 1);
        let calls = locator.store().calls();
        assert_eq!(calls.last(), Some(&format!("list:{ROAD_PREFIX}")));
        Ok(())
    }

    #[tokio::test]
    async fn short_name_resolves_to_its_revised_preview() -> Result<(), ResolveError> {
        let revised = "docuworks-converted/structure/ts-server7/2026/01/19/084228_ts-server7_報告書(訂正)_20260114115628.pdf";
        let locator = locator(ScriptedStore::with_keys([revised]));

        let result = locator
            .resolve("documents/structure/ts-server7/H22_JOB/図面/報告書.xdw")
            .await?;

        assert!(result.found);
        assert_eq!(result.phase, Some(Phase::Broad));
        assert_eq!(result.object_key.as_deref(), Some(revised));
        assert!(result.score.unwrap_or_default() >= ACCEPTANCE_FLOOR);
        Ok(())
    }

    #[test]
    fn scoped_prefixes_include_the_project_subdirectory_for_deep_files() {
        let locator = locator(ScriptedStore::default());
        let relative = "road/ts-server3/R06_JOB/図面/2020/旧/plan.xdw";
        let target = locator.normalizer().normalize(relative);

        assert_eq!(
            locator.scoped_prefixes(relative, &target),
            vec![
                "docuworks-converted/road/ts-server3/R06_JOB/図面/2020/旧/".to_string(),
                "docuworks-converted/road/ts-server3/R06_JOB/図面/".to_string(),
            ]
        );
    }

    #[test]
    fn direct_keys_rewrite_root_and_extension() {
        let locator = locator(ScriptedStore::default());
        assert_eq!(
            locator.direct_keys("road/ts-server3/R06_JOB/plan.xdw"),
            vec![
                "documents/road/ts-server3/R06_JOB/plan.pdf".to_string(),
                "docuworks-converted/road/ts-server3/R06_JOB/plan.pdf".to_string(),
            ]
        );
        assert!(locator.direct_keys("").is_empty());
    }

    #[test]
    fn ledger_escalates_only_when_every_touched_phase_failed() {
        let mut ledger = CallLedger::default();
        assert!(!ledger.all_failed());

        ledger.record(Phase::Direct, false);
        ledger.record(Phase::Broad, false);
        assert!(ledger.all_failed());

        ledger.record(Phase::Broad, true);
        assert!(!ledger.all_failed());
    }
}
