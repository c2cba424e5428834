//! The process-wide registry of thread storages and calibration state.

use std::sync::{Arc, Mutex, OnceLock};

use crate::ident::Id;
use crate::thread_storage::ThreadStorage;
use crate::timestamp::CALIBRATION_SLOTS;

thread_local! {
    /// This thread's [`ThreadStorage`], created and registered with the
    /// [`Manager`] the first time any instrumentation call reaches this
    /// thread. The registration happens exactly once, inside the
    /// `thread_local!` initializer, which is why `ThreadStorage::new` and
    /// `Manager::register` never appear on the `Start`/`Stop`/`Pulse` path
    /// itself — only the (cold) first call on a given thread runs them.
    static LOCAL: Arc<ThreadStorage> = {
        let storage = Arc::new(ThreadStorage::new());
        Manager::global().register(Arc::clone(&storage));
        storage
    };
}

/// Run `f` against the calling thread's [`ThreadStorage`], lazily creating
/// and registering it on first use.
///
/// This is the sole entry point [`crate::recorder`] and [`crate::pulse`] use
/// to reach thread-local state; keeping it a borrow rather than handing out
/// a cloned `Arc` avoids an atomic increment/decrement pair on every
/// `Start`/`Stop`/`Pulse` call.
#[inline]
pub(crate) fn with_current<R>(f: impl FnOnce(&ThreadStorage) -> R) -> R {
    LOCAL.with(|storage| f(storage))
}

/// Calibrated instrumentation overhead, in cycles, indexed by calibration
/// key (`0..=8` for the nine start/stop mode permutations, `9` for Pulse).
pub(crate) struct CalibrationTable {
    pub(crate) cycles_per_ns: f64,
    offsets: [u64; CALIBRATION_SLOTS],
    valid: [bool; CALIBRATION_SLOTS],
}

impl CalibrationTable {
    pub(crate) fn offset_for(&self, key: u8) -> u64 {
        match self.valid.get(key as usize) {
            Some(true) => self.offsets[key as usize],
            _ => 0,
        }
    }
}

struct Registry {
    threads: Vec<Arc<ThreadStorage>>,
}

/// Process-wide singleton coordinating every thread's storage.
///
/// Everything this type guards is cold-path: registration happens once per
/// thread, calibration happens once per process, and extraction only runs
/// when a report is being produced. No `Start`/`Stop`/`Pulse` call ever
/// touches the `Mutex` below.
pub struct Manager {
    registry: Mutex<Registry>,
    calibration: OnceLock<CalibrationTable>,
}

impl Manager {
    const fn new() -> Self {
        Self {
            registry: Mutex::new(Registry {
                threads: Vec::new(),
            }),
            calibration: OnceLock::new(),
        }
    }

    /// The process-wide instance.
    pub fn global() -> &'static Manager {
        static MANAGER: Manager = Manager::new();
        &MANAGER
    }

    /// Register a newly-created thread storage. Called exactly once per
    /// thread, from that thread's `thread_local!` initializer.
    pub(crate) fn register(&self, storage: Arc<ThreadStorage>) {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        registry.threads.push(storage);
        log::debug!(
            "registered thread storage for {:?} ({} threads total)",
            std::thread::current().id(),
            registry.threads.len()
        );
    }

    /// Run the self-calibration procedure at most once for the life of the
    /// process. Subsequent calls are no-ops that return immediately once the
    /// first call's measurement has completed — `OnceLock::get_or_init`
    /// blocks concurrent callers on the same initialization rather than
    /// racing them.
    pub fn ensure_calibrated(&self) {
        self.calibration.get_or_init(|| {
            log::info!("running instrumentation self-calibration");
            let table = crate::calibrate::run(self);
            log::info!(
                "calibration complete: {:.3} cycles/ns",
                table.cycles_per_ns
            );
            table
        });
    }

    /// The measured cycles-per-nanosecond constant, or `None` if calibration
    /// has not run yet.
    pub(crate) fn cycles_per_ns(&self) -> Option<f64> {
        self.calibration.get().map(|c| c.cycles_per_ns)
    }

    /// The calibrated overhead, in cycles, for `key`. Returns 0 for the
    /// sentinel keys (`UNSET`/`MIXED`), for keys outside the valid range, or
    /// if calibration has not run yet.
    pub(crate) fn calibration_offset(&self, key: u8) -> u64 {
        match self.calibration.get() {
            Some(table) => table.offset_for(key),
            None => 0,
        }
    }

    /// Collect every non-zero sample recorded for `id`, across every
    /// registered thread, under a single hold of the registry lock.
    pub fn extract_raw(&self, id: Id) -> Vec<u64> {
        let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        let mut out = Vec::new();
        for thread in registry.threads.iter() {
            thread.snapshot_into(id, &mut out);
        }
        out
    }

    /// Every measurement site any registered thread has a buffer for, deduped
    /// by address and sorted for deterministic report ordering. Used by the
    /// Reporter to discover what to report on without the caller having to
    /// name every site up front.
    pub(crate) fn all_ids(&self) -> Vec<Id> {
        use std::collections::HashSet;

        let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for thread in registry.threads.iter() {
            let mut thread_ids = Vec::new();
            thread.ids_into(&mut thread_ids);
            for id in thread_ids {
                if seen.insert(id) {
                    ids.push(id);
                }
            }
        }
        ids.sort_unstable();
        ids
    }

    /// The calibration tag observed for `id`, scanning every registered
    /// thread and returning [`crate::timestamp::CALIB_KEY_MIXED`] if threads
    /// disagree.
    pub(crate) fn calib_key_for(&self, id: Id) -> u8 {
        use crate::timestamp::{CALIB_KEY_MIXED, CALIB_KEY_UNSET};

        let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        let mut seen: Option<u8> = None;
        for thread in registry.threads.iter() {
            if let Some(key) = thread.calib_key_for(id) {
                if key == CALIB_KEY_UNSET {
                    continue;
                }
                match seen {
                    None => seen = Some(key),
                    Some(existing) if existing == key || key == CALIB_KEY_MIXED => {}
                    Some(_) => seen = Some(CALIB_KEY_MIXED),
                }
            }
        }
        seen.unwrap_or(CALIB_KEY_UNSET)
    }

    /// Complete calibration by recording its measured table and erasing the
    /// telemetry ids calibration generated from the calibrating thread's
    /// own buffer map, so they never appear in a user-facing report.
    pub(crate) fn finish_calibration(
        cycles_per_ns: f64,
        offsets: [u64; CALIBRATION_SLOTS],
        valid: [bool; CALIBRATION_SLOTS],
    ) -> CalibrationTable {
        CalibrationTable {
            cycles_per_ns,
            offsets,
            valid,
        }
    }
}
