//! Authoritative plan state: selected services, tasks, and the relocation
//! profile.
//!
//! Readers take an `Arc` of the current [`TimelineSnapshot`]; writers build a
//! complete replacement and swap it in under the write lock. Every task write
//! path de-duplicates by id (first occurrence wins) and re-runs enrichment.
//! Persistence is best-effort and happens under the write lock so the stored
//! copy never goes backwards.

use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use chrono::{Datelike, Utc};
use tracing::{debug, info};

use relocation_core::config::StorageConfig;
use relocation_core::error::RelocationError;
use relocation_core::events::{EventBus, TimelineEvent};
use relocation_core::{
    ProfileUpdate, RelocationProfile, ResearchState, ServiceId, Task, TaskPatch, TaskStatus,
    Timestamp,
};
use relocation_storage::{load_json, persist_json, KeyValueStore, MemoryKeyValueStore};

use crate::enrichment::enrich_tasks;
use crate::enrichment::placeholders::PlaceholderValues;
use crate::error::TimelineError;
use crate::templates::{instantiate, missing_templates};

/// Immutable view of the whole plan at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelineSnapshot {
    pub selected_services: Vec<ServiceId>,
    pub tasks: Vec<Task>,
    pub profile: RelocationProfile,
}

impl TimelineSnapshot {
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn tasks_for(&self, service: ServiceId) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.service_id == service)
    }

    /// Tasks belonging to a selected service.
    pub fn visible_tasks(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| self.selected_services.contains(&t.service_id))
            .collect()
    }

    pub fn is_selected(&self, service: ServiceId) -> bool {
        self.selected_services.contains(&service)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Dirty {
    services: bool,
    tasks: bool,
    profile: bool,
}

impl Dirty {
    fn any(&self) -> bool {
        self.services || self.tasks || self.profile
    }
}

/// Single source of truth for the relocation plan.
pub struct TimelineStore {
    state: RwLock<Arc<TimelineSnapshot>>,
    kv: Arc<dyn KeyValueStore>,
    keys: StorageConfig,
    events: EventBus,
    current_year: i32,
}

impl std::fmt::Debug for TimelineStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineStore")
            .field("namespace", &self.keys.key_namespace)
            .finish()
    }
}

impl TimelineStore {
    /// Load persisted state from `kv`.
    ///
    /// Missing or malformed entries load as empty. Unknown service ids and
    /// tasks that fail to decode are dropped individually. `{{current_year}}`
    /// renders as the year the store was opened in.
    pub fn open(kv: Arc<dyn KeyValueStore>, keys: &StorageConfig, events: EventBus) -> Self {
        Self::open_for_year(kv, keys, events, Utc::now().year())
    }

    /// Like [`TimelineStore::open`], with the placeholder year fixed.
    pub fn open_for_year(
        kv: Arc<dyn KeyValueStore>,
        keys: &StorageConfig,
        events: EventBus,
        current_year: i32,
    ) -> Self {
        let selected_services = dedup_services(
            load_json::<Vec<String>>(kv.as_ref(), &keys.selected_services_key())
                .unwrap_or_default()
                .iter()
                .filter_map(|raw| raw.parse::<ServiceId>().ok()),
        );

        let tasks: Vec<Task> =
            load_json::<Vec<serde_json::Value>>(kv.as_ref(), &keys.timeline_tasks_key())
                .unwrap_or_default()
                .into_iter()
                .filter_map(|raw| match serde_json::from_value::<Task>(raw) {
                    Ok(task) => Some(task),
                    Err(e) => {
                        debug!(error = %e, "Dropping persisted task");
                        None
                    }
                })
                .collect();

        let profile: RelocationProfile =
            load_json(kv.as_ref(), &keys.relocation_profile_key()).unwrap_or_default();

        let tasks = canonicalize(tasks, &profile, current_year);
        info!(
            services = selected_services.len(),
            tasks = tasks.len(),
            "Timeline state loaded"
        );

        Self {
            state: RwLock::new(Arc::new(TimelineSnapshot {
                selected_services,
                tasks,
                profile,
            })),
            kv,
            keys: keys.clone(),
            events,
            current_year,
        }
    }

    /// Store backed by process memory, with default keys.
    pub fn in_memory() -> Self {
        Self::open(
            Arc::new(MemoryKeyValueStore::new()),
            &StorageConfig::default(),
            EventBus::default(),
        )
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Year substituted for `{{current_year}}`.
    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    /// Current snapshot. Never observes a partially applied write.
    pub fn snapshot(&self) -> Arc<TimelineSnapshot> {
        match self.state.read() {
            Ok(guard) => Arc::clone(&guard),
            // Writers only ever swap a finished snapshot in, so the value
            // behind a poisoned lock is still consistent.
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn selected_services(&self) -> Vec<ServiceId> {
        self.snapshot().selected_services.clone()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.snapshot().tasks.clone()
    }

    pub fn profile(&self) -> RelocationProfile {
        self.snapshot().profile.clone()
    }

    // =========================================================================
    // Services
    // =========================================================================

    /// Replace the selected services.
    ///
    /// Unless `allow_reduction` is set, an update that would drop any
    /// currently selected service is applied as a union instead. The agent
    /// sometimes sends a narrowed list by mistake; only an explicit reset may
    /// shrink the selection through this path.
    pub fn set_selected_services(
        &self,
        ids: &[ServiceId],
        allow_reduction: bool,
    ) -> Result<Vec<ServiceId>, TimelineError> {
        let requested = dedup_services(ids.iter().copied());
        self.mutate(|next| {
            let current = &next.selected_services;
            let drops_any = current.iter().any(|id| !requested.contains(id));
            let merged = if !allow_reduction && !current.is_empty() && drops_any {
                debug!(
                    current = ?current,
                    requested = ?requested,
                    "Narrowing service update merged into current selection"
                );
                dedup_services(current.iter().chain(requested.iter()).copied())
            } else {
                requested
            };
            let dirty = Dirty {
                services: merged != next.selected_services,
                ..Default::default()
            };
            next.selected_services = merged;
            (next.selected_services.clone(), dirty)
        })
    }

    /// Add `ids` to the selection.
    pub fn add_services(&self, ids: &[ServiceId]) -> Result<Vec<ServiceId>, TimelineError> {
        let current = self.selected_services();
        let union = dedup_services(current.iter().chain(ids.iter()).copied());
        self.set_selected_services(&union, false)
    }

    /// Remove `ids` from the selection unless that would leave it empty, in
    /// which case the selection is left unchanged.
    pub fn remove_services(&self, ids: &[ServiceId]) -> Result<Vec<ServiceId>, TimelineError> {
        self.mutate(|next| {
            let remaining: Vec<ServiceId> = next
                .selected_services
                .iter()
                .copied()
                .filter(|id| !ids.contains(id))
                .collect();
            let dirty = Dirty {
                services: !remaining.is_empty() && remaining != next.selected_services,
                ..Default::default()
            };
            if dirty.services {
                next.selected_services = remaining;
            }
            (next.selected_services.clone(), dirty)
        })
    }

    /// Flip one service on or off. Always honored.
    pub fn toggle_service(&self, id: ServiceId) -> Result<Vec<ServiceId>, TimelineError> {
        self.mutate(|next| {
            if next.selected_services.contains(&id) {
                next.selected_services.retain(|s| *s != id);
            } else {
                next.selected_services.push(id);
            }
            let dirty = Dirty {
                services: true,
                ..Default::default()
            };
            (next.selected_services.clone(), dirty)
        })
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    /// Replace by id, or append.
    pub fn upsert_task(&self, task: Task) -> Result<(), TimelineError> {
        self.mutate(|next| {
            match next.tasks.iter_mut().find(|t| t.id == task.id) {
                Some(existing) => *existing = task,
                None => next.tasks.push(task),
            }
            ((), tasks_dirty())
        })
    }

    /// Returns `false` when no task has `id`.
    pub fn update_task_status(&self, id: &str, status: TaskStatus) -> Result<bool, TimelineError> {
        self.mutate(|next| match next.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.status = status;
                task.last_updated_at = Some(Timestamp::now());
                (true, tasks_dirty())
            }
            None => (false, Dirty::default()),
        })
    }

    /// Apply a field patch. Returns the updated task, or `None` for an
    /// unknown id.
    pub fn patch_task(&self, id: &str, patch: &TaskPatch) -> Result<Option<Task>, TimelineError> {
        let found = self.mutate(|next| match next.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                patch.apply_to(task);
                (true, tasks_dirty())
            }
            None => (false, Dirty::default()),
        })?;
        Ok(found.then(|| self.snapshot().task(id).cloned()).flatten())
    }

    /// Wholesale replacement of the task list.
    pub fn replace_tasks(&self, tasks: Vec<Task>) -> Result<(), TimelineError> {
        self.mutate(|next| {
            next.tasks = tasks;
            ((), tasks_dirty())
        })
    }

    /// Apply a batch of `(id, patch)` updates in a single write.
    ///
    /// Ids not in the plan are passed to `create` with the sequence number a
    /// new task would take; updates for which it returns `None` are skipped.
    /// Returns the ids touched, in first-touch order.
    pub fn apply_task_updates<F>(
        &self,
        updates: &[(String, TaskPatch)],
        create: F,
    ) -> Result<Vec<String>, TimelineError>
    where
        F: Fn(&str, &TaskPatch, u32) -> Option<Task>,
    {
        self.mutate(|next| {
            let base_len = next.tasks.len() as u32;
            let mut touched: Vec<String> = Vec::new();
            for (id, patch) in updates {
                if let Some(existing) = next.tasks.iter_mut().find(|t| &t.id == id) {
                    patch.apply_to(existing);
                } else {
                    let sequence = base_len + touched.len() as u32 + 1;
                    match create(id, patch, sequence) {
                        Some(task) => next.tasks.push(task),
                        None => {
                            debug!(task_id = %id, "Skipping update for unknown task");
                            continue;
                        }
                    }
                }
                if !touched.contains(id) {
                    touched.push(id.clone());
                }
            }
            let dirty = Dirty {
                tasks: !touched.is_empty(),
                ..Default::default()
            };
            (touched, dirty)
        })
    }

    /// Instantiate the templates of `service` not yet represented in the
    /// plan. Returns only the newly created tasks; repeated calls return an
    /// empty list.
    pub fn build_service_tasks(&self, service: ServiceId) -> Result<Vec<Task>, TimelineError> {
        let created_ids = self.mutate(|next| {
            let created: Vec<Task> = missing_templates(service, &next.tasks)
                .into_iter()
                .map(|(template, sequence)| instantiate(service, template, sequence))
                .collect();
            let ids: Vec<String> = created.iter().map(|t| t.id.clone()).collect();
            let dirty = Dirty {
                tasks: !created.is_empty(),
                ..Default::default()
            };
            next.tasks.extend(created);
            (ids, dirty)
        })?;

        if !created_ids.is_empty() {
            info!(service = %service, created = created_ids.len(), "Built service tasks");
        }
        let snapshot = self.snapshot();
        Ok(created_ids
            .iter()
            .filter_map(|id| snapshot.task(id).cloned())
            .collect())
    }

    /// Record the status of a task's research query.
    pub fn set_research_state(
        &self,
        task_id: &str,
        state: ResearchState,
    ) -> Result<bool, TimelineError> {
        let found = self.mutate(|next| match next.tasks.iter_mut().find(|t| t.id == task_id) {
            Some(task) => {
                task.research_state = Some(state.clone());
                (true, tasks_dirty())
            }
            None => (false, Dirty::default()),
        })?;
        if found {
            self.events.publish(TimelineEvent::ResearchUpdated {
                task_id: task_id.to_string(),
                state,
                timestamp: Timestamp::now(),
            });
        }
        Ok(found)
    }

    // =========================================================================
    // Profile and reset
    // =========================================================================

    /// Shallow-merge `update` into the profile.
    pub fn set_relocation_profile(
        &self,
        update: &ProfileUpdate,
    ) -> Result<RelocationProfile, TimelineError> {
        self.mutate(|next| {
            next.profile = next.profile.merged(update);
            let dirty = Dirty {
                profile: true,
                ..Default::default()
            };
            (next.profile.clone(), dirty)
        })
    }

    /// Clear services, tasks, and profile in one step.
    ///
    /// Publishes the three empty states exactly once each, then `PlanReset`.
    pub fn reset_all(&self) -> Result<(), TimelineError> {
        let mut guard = self.write_guard()?;
        *guard = Arc::new(TimelineSnapshot::default());
        let all = Dirty {
            services: true,
            tasks: true,
            profile: true,
        };
        self.persist(&guard, all);
        self.announce(&guard, all);
        self.events.publish(TimelineEvent::PlanReset {
            timestamp: Timestamp::now(),
        });
        info!("Relocation plan reset");
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn write_guard(&self) -> Result<RwLockWriteGuard<'_, Arc<TimelineSnapshot>>, TimelineError> {
        self.state.write().map_err(|e| {
            TimelineError::Storage(RelocationError::Storage(format!(
                "Timeline lock poisoned: {}",
                e
            )))
        })
    }

    /// Run `f` on a copy of the current snapshot and commit the result.
    fn mutate<R, F>(&self, f: F) -> Result<R, TimelineError>
    where
        F: FnOnce(&mut TimelineSnapshot) -> (R, Dirty),
    {
        let mut guard = self.write_guard()?;
        let mut next = TimelineSnapshot::clone(&guard);
        let (result, dirty) = f(&mut next);
        if !dirty.any() {
            return Ok(result);
        }
        if dirty.tasks || dirty.profile {
            next.tasks = canonicalize(
                std::mem::take(&mut next.tasks),
                &next.profile,
                self.current_year,
            );
        }
        *guard = Arc::new(next);
        self.persist(&guard, dirty);
        self.announce(&guard, dirty);
        Ok(result)
    }

    fn persist(&self, snapshot: &TimelineSnapshot, dirty: Dirty) {
        let kv = self.kv.as_ref();
        if dirty.services {
            persist_json(kv, &self.keys.selected_services_key(), &snapshot.selected_services);
        }
        if dirty.tasks || dirty.profile {
            persist_json(kv, &self.keys.timeline_tasks_key(), &snapshot.tasks);
        }
        if dirty.profile {
            persist_json(kv, &self.keys.relocation_profile_key(), &snapshot.profile);
        }
    }

    fn announce(&self, snapshot: &TimelineSnapshot, dirty: Dirty) {
        let timestamp = Timestamp::now();
        if dirty.services {
            self.events.publish(TimelineEvent::ServicesChanged {
                services: snapshot.selected_services.clone(),
                timestamp,
            });
        }
        if dirty.tasks {
            self.events.publish(TimelineEvent::TasksUpdated {
                tasks: snapshot.tasks.clone(),
                timestamp,
            });
        }
        if dirty.profile {
            self.events.publish(TimelineEvent::ProfileChanged {
                profile: snapshot.profile.clone(),
                timestamp,
            });
        }
    }
}

fn tasks_dirty() -> Dirty {
    Dirty {
        tasks: true,
        ..Default::default()
    }
}

fn dedup_services(ids: impl IntoIterator<Item = ServiceId>) -> Vec<ServiceId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Drop repeated ids (first occurrence wins) and enrich.
fn canonicalize(tasks: Vec<Task>, profile: &RelocationProfile, current_year: i32) -> Vec<Task> {
    let mut seen = HashSet::new();
    let unique: Vec<Task> = tasks
        .into_iter()
        .filter(|task| seen.insert(task.id.clone()))
        .collect();
    enrich_tasks(unique, &PlaceholderValues::from_profile(profile, current_year))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<TimelineEvent>) -> Vec<TimelineEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return events,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
    }

    fn bare_task(id: &str, service: ServiceId) -> Task {
        Task {
            id: id.to_string(),
            service_id: service,
            title: format!("Task {}", id),
            description: String::new(),
            timeframe: "TBD".into(),
            status: TaskStatus::Pending,
            sequence: 1,
            last_updated_at: None,
            template_slug: None,
            extra_info: vec![],
            actions: vec![],
            rule_actions: Vec::new(),
            research_state: None,
        }
    }

    fn assert_unique_ids(tasks: &[Task]) {
        let ids: HashSet<_> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), tasks.len());
    }

    #[test]
    fn test_set_services_replaces_when_growing() {
        let store = TimelineStore::in_memory();
        store
            .set_selected_services(&[ServiceId::Housing], false)
            .unwrap();
        let result = store
            .set_selected_services(&[ServiceId::Housing, ServiceId::Moving], false)
            .unwrap();
        assert_eq!(result, vec![ServiceId::Housing, ServiceId::Moving]);
    }

    #[test]
    fn test_set_services_merges_on_reduction() {
        let store = TimelineStore::in_memory();
        store
            .set_selected_services(&[ServiceId::Housing, ServiceId::Immigration], false)
            .unwrap();
        let result = store
            .set_selected_services(&[ServiceId::Housing], false)
            .unwrap();
        assert_eq!(result, vec![ServiceId::Housing, ServiceId::Immigration]);
    }

    #[test]
    fn test_set_services_merges_same_size_swap() {
        let store = TimelineStore::in_memory();
        store
            .set_selected_services(&[ServiceId::Housing], false)
            .unwrap();
        let result = store
            .set_selected_services(&[ServiceId::Moving], false)
            .unwrap();
        assert_eq!(result, vec![ServiceId::Housing, ServiceId::Moving]);
    }

    #[test]
    fn test_no_service_loss_over_sequence() {
        let store = TimelineStore::in_memory();
        let updates: Vec<Vec<ServiceId>> = vec![
            vec![ServiceId::Housing],
            vec![ServiceId::Finances, ServiceId::Finances],
            vec![],
            vec![ServiceId::Settling, ServiceId::Housing],
            vec![ServiceId::Moving],
        ];
        let mut history: Vec<Vec<ServiceId>> = Vec::new();
        for update in updates {
            let result = store.set_selected_services(&update, false).unwrap();
            if !update.is_empty() {
                history.push(update);
            }
            for earlier in &history {
                assert!(earlier.iter().all(|id| result.contains(id)));
            }
        }
    }

    #[test]
    fn test_reduction_allowed_when_flagged() {
        let store = TimelineStore::in_memory();
        store
            .set_selected_services(&[ServiceId::Housing, ServiceId::Moving], false)
            .unwrap();
        let result = store.set_selected_services(&[], true).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_toggle_service_bypasses_guard() {
        let store = TimelineStore::in_memory();
        store.toggle_service(ServiceId::Finances).unwrap();
        assert_eq!(store.selected_services(), vec![ServiceId::Finances]);
        store.toggle_service(ServiceId::Finances).unwrap();
        assert!(store.selected_services().is_empty());
    }

    #[test]
    fn test_remove_services_never_empties() {
        let store = TimelineStore::in_memory();
        store
            .set_selected_services(&[ServiceId::Housing, ServiceId::Immigration], false)
            .unwrap();

        let result = store
            .remove_services(&[ServiceId::Housing, ServiceId::Immigration])
            .unwrap();
        assert_eq!(result, vec![ServiceId::Housing, ServiceId::Immigration]);

        let result = store.remove_services(&[ServiceId::Housing]).unwrap();
        assert_eq!(result, vec![ServiceId::Immigration]);
    }

    #[test]
    fn test_build_service_tasks_is_idempotent() {
        let store = TimelineStore::in_memory();
        let first = store.build_service_tasks(ServiceId::Immigration).unwrap();
        assert_eq!(first.len(), 3);
        assert!(first.iter().all(|t| t.service_id == ServiceId::Immigration));
        assert_eq!(
            first.iter().map(|t| t.sequence).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        let second = store.build_service_tasks(ServiceId::Immigration).unwrap();
        assert!(second.is_empty());
        assert_eq!(store.tasks().len(), 3);
    }

    #[test]
    fn test_build_returns_enriched_tasks() {
        let store = TimelineStore::in_memory();
        let created = store.build_service_tasks(ServiceId::Housing).unwrap();
        let viewings = created
            .iter()
            .find(|t| t.template_slug.as_deref() == Some("schedule-viewings"))
            .unwrap();
        assert!(viewings.find_action("tour-booking-slot").is_some());
    }

    #[test]
    fn test_replace_tasks_dedups_first_wins() {
        let store = TimelineStore::in_memory();
        let mut first = bare_task("a", ServiceId::Moving);
        first.title = "first".into();
        let mut dup = bare_task("a", ServiceId::Moving);
        dup.title = "second".into();

        store
            .replace_tasks(vec![
                first,
                bare_task("b", ServiceId::Moving),
                dup,
                bare_task("c", ServiceId::Finances),
            ])
            .unwrap();

        let tasks = store.tasks();
        assert_eq!(
            tasks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        assert_eq!(tasks[0].title, "first");
    }

    #[test]
    fn test_task_ids_stay_unique_across_mutations() {
        let store = TimelineStore::in_memory();
        store.build_service_tasks(ServiceId::Housing).unwrap();
        store.build_service_tasks(ServiceId::Moving).unwrap();
        let existing = store.tasks()[0].clone();
        store.upsert_task(existing.clone()).unwrap();
        store.upsert_task(bare_task("custom", ServiceId::Housing)).unwrap();
        store.upsert_task(bare_task("custom", ServiceId::Housing)).unwrap();
        let mut doubled = store.tasks();
        doubled.extend(store.tasks());
        store.replace_tasks(doubled).unwrap();
        store.build_service_tasks(ServiceId::Housing).unwrap();

        let tasks = store.tasks();
        assert_eq!(tasks.len(), 7);
        assert_unique_ids(&tasks);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let store = TimelineStore::in_memory();
        store.upsert_task(bare_task("a", ServiceId::Moving)).unwrap();
        store.upsert_task(bare_task("b", ServiceId::Moving)).unwrap();

        let mut changed = bare_task("a", ServiceId::Moving);
        changed.title = "Renamed".into();
        store.upsert_task(changed).unwrap();

        let tasks = store.tasks();
        assert_eq!(tasks[0].title, "Renamed");
        assert_eq!(tasks[1].id, "b");
    }

    #[test]
    fn test_update_task_status() {
        let store = TimelineStore::in_memory();
        store.upsert_task(bare_task("a", ServiceId::Moving)).unwrap();

        assert!(store
            .update_task_status("a", TaskStatus::Completed)
            .unwrap());
        let task = store.snapshot().task("a").cloned().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.last_updated_at.is_some());

        assert!(!store
            .update_task_status("missing", TaskStatus::Completed)
            .unwrap());
    }

    #[test]
    fn test_unknown_status_update_publishes_nothing() {
        let store = TimelineStore::in_memory();
        let mut rx = store.events().subscribe();
        store
            .update_task_status("missing", TaskStatus::Completed)
            .unwrap();
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_patch_task() {
        let store = TimelineStore::in_memory();
        store.upsert_task(bare_task("a", ServiceId::Moving)).unwrap();
        let patch = TaskPatch {
            timeframe: Some("Week 4".into()),
            ..Default::default()
        };
        let updated = store.patch_task("a", &patch).unwrap().unwrap();
        assert_eq!(updated.timeframe, "Week 4");
        assert!(store.patch_task("zzz", &patch).unwrap().is_none());
    }

    #[test]
    fn test_profile_partial_merge() {
        let store = TimelineStore::in_memory();
        store
            .set_relocation_profile(&ProfileUpdate {
                to_city: Some("Berlin".into()),
                ..Default::default()
            })
            .unwrap();
        let profile = store
            .set_relocation_profile(&ProfileUpdate {
                from_city: Some("Paris".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(profile.from_city.as_deref(), Some("Paris"));
        assert_eq!(profile.to_city.as_deref(), Some("Berlin"));
    }

    #[test]
    fn test_profile_renders_into_new_actions() {
        let store = TimelineStore::in_memory();
        store
            .set_relocation_profile(&ProfileUpdate {
                to_city: Some("Lisbon".into()),
                ..Default::default()
            })
            .unwrap();
        let created = store.build_service_tasks(ServiceId::Settling).unwrap();
        let schools = created
            .iter()
            .find(|t| t.template_slug.as_deref() == Some("schools"))
            .unwrap();
        match schools.find_action("schools-research") {
            Some(relocation_core::TaskAction::Research(r)) => {
                assert!(r.default_query.as_deref().unwrap().contains("Lisbon"))
            }
            other => panic!("expected research action, got {:?}", other),
        }
    }

    fn research_query(task: &Task, id: &str) -> String {
        match task.find_action(id) {
            Some(relocation_core::TaskAction::Research(r)) => {
                r.default_query.clone().unwrap_or_default()
            }
            other => panic!("expected research action, got {:?}", other),
        }
    }

    #[test]
    fn test_profile_change_rerenders_attached_actions() {
        let store = TimelineStore::in_memory();
        store.build_service_tasks(ServiceId::Housing).unwrap();
        let by_slug = |slug: &str| {
            store
                .tasks()
                .into_iter()
                .find(|t| t.template_slug.as_deref() == Some(slug))
                .unwrap()
        };
        let action_count = by_slug("discover-neighborhoods").actions.len();

        for city in ["Lisbon", "Berlin"] {
            store
                .set_relocation_profile(&ProfileUpdate {
                    to_city: Some(city.into()),
                    ..Default::default()
                })
                .unwrap();

            let neighborhoods = by_slug("discover-neighborhoods");
            let query = research_query(&neighborhoods, "neighborhood-research-insights");
            assert!(query.contains(city), "{} missing from {:?}", city, query);
            assert_eq!(neighborhoods.actions.len(), action_count);

            match by_slug("lease-checklist").find_action("lease-housing-search") {
                Some(relocation_core::TaskAction::HousingSearch(h)) => {
                    assert_eq!(h.location.as_deref(), Some(city))
                }
                other => panic!("expected housing search action, got {:?}", other),
            }
        }

        let neighborhoods = by_slug("discover-neighborhoods");
        assert!(!research_query(&neighborhoods, "neighborhood-research-insights").contains("Lisbon"));
    }

    #[test]
    fn test_rerender_keeps_manual_actions() {
        let store = TimelineStore::in_memory();
        let created = store.build_service_tasks(ServiceId::Housing).unwrap();
        let mut task = created
            .into_iter()
            .find(|t| t.template_slug.as_deref() == Some("discover-neighborhoods"))
            .unwrap();
        task.actions.insert(
            0,
            relocation_core::TaskAction::Note(relocation_core::NoteAction {
                id: Some("my-note".into()),
                text: "Ask about parking in {{destination_city}}".into(),
            }),
        );
        store.upsert_task(task.clone()).unwrap();

        store
            .set_relocation_profile(&ProfileUpdate {
                to_city: Some("Oslo".into()),
                ..Default::default()
            })
            .unwrap();

        let updated = store.snapshot().task(&task.id).cloned().unwrap();
        assert_eq!(updated.actions.len(), task.actions.len());
        assert_eq!(updated.actions[0].id(), Some("my-note"));
        assert!(research_query(&updated, "neighborhood-research-insights").contains("Oslo"));
    }

    #[test]
    fn test_current_year_is_fixed_per_store() {
        let store = TimelineStore::open_for_year(
            Arc::new(MemoryKeyValueStore::new()),
            &StorageConfig::default(),
            EventBus::default(),
            2031,
        );
        assert_eq!(store.current_year(), 2031);

        store.build_service_tasks(ServiceId::Moving).unwrap();
        let shippers = store
            .tasks()
            .into_iter()
            .find(|t| t.template_slug.as_deref() == Some("shippers"))
            .unwrap();
        assert!(research_query(&shippers, "moving-research-companies").ends_with("2031"));
    }

    #[test]
    fn test_apply_task_updates_in_one_write() {
        let store = TimelineStore::in_memory();
        store.upsert_task(bare_task("a", ServiceId::Housing)).unwrap();
        let mut rx = store.events().subscribe();

        let updates = vec![
            (
                "a".to_string(),
                TaskPatch {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
            ),
            (
                "new".to_string(),
                TaskPatch {
                    service_id: Some(ServiceId::Moving),
                    ..Default::default()
                },
            ),
            ("ghost".to_string(), TaskPatch::default()),
        ];
        let touched = store
            .apply_task_updates(&updates, |id, patch, sequence| {
                patch.service_id.map(|service| {
                    let mut task = bare_task(id, service);
                    task.sequence = sequence;
                    task
                })
            })
            .unwrap();

        assert_eq!(touched, vec!["a".to_string(), "new".to_string()]);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.task("a").unwrap().status, TaskStatus::Completed);
        assert_eq!(snapshot.task("new").unwrap().sequence, 3);
        assert!(snapshot.task("ghost").is_none());

        let names: Vec<_> = drain(&mut rx).iter().map(|e| e.event_name()).collect();
        assert_eq!(names, vec!["tasks_updated"]);
    }

    #[test]
    fn test_batch_updates_keep_concurrent_writes() {
        let store = Arc::new(TimelineStore::in_memory());
        store.upsert_task(bare_task("a", ServiceId::Housing)).unwrap();
        store.upsert_task(bare_task("b", ServiceId::Housing)).unwrap();
        const ROUNDS: usize = 200;

        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..ROUNDS {
                    let patch = TaskPatch {
                        title: Some(format!("Title {}", i)),
                        ..Default::default()
                    };
                    store
                        .apply_task_updates(&[("a".to_string(), patch)], |_, _, _| None)
                        .unwrap();
                }
            })
        };
        for i in 0..ROUNDS {
            let state = ResearchState {
                last_query: Some(format!("query {}", i)),
                ..Default::default()
            };
            store.set_research_state("b", state).unwrap();
        }
        writer.join().unwrap();

        let snapshot = store.snapshot();
        assert_eq!(
            snapshot.task("a").unwrap().title,
            format!("Title {}", ROUNDS - 1)
        );
        let research = snapshot.task("b").unwrap().research_state.clone().unwrap();
        assert_eq!(research.last_query, Some(format!("query {}", ROUNDS - 1)));
    }

    #[test]
    fn test_research_cap_holds_in_store() {
        let store = TimelineStore::in_memory();
        store.build_service_tasks(ServiceId::Housing).unwrap();
        for _ in 0..3 {
            store.replace_tasks(store.tasks()).unwrap();
        }
        assert!(store.tasks().iter().all(|t| t.research_action_count() <= 2));
    }

    #[test]
    fn test_set_research_state_publishes() {
        let store = TimelineStore::in_memory();
        store.upsert_task(bare_task("a", ServiceId::Housing)).unwrap();
        let mut rx = store.events().subscribe();

        let state = ResearchState {
            last_query_id: Some("q1".into()),
            status: relocation_core::ResearchStatus::Pending,
            ..Default::default()
        };
        assert!(store.set_research_state("a", state.clone()).unwrap());

        let names: Vec<_> = drain(&mut rx).iter().map(|e| e.event_name()).collect();
        assert_eq!(names, vec!["tasks_updated", "research_updated"]);
        assert_eq!(
            store.snapshot().task("a").unwrap().research_state,
            Some(state)
        );
    }

    #[test]
    fn test_reset_all_clears_and_notifies_once() {
        let store = TimelineStore::in_memory();
        store
            .set_selected_services(&[ServiceId::Housing, ServiceId::Moving], false)
            .unwrap();
        store.build_service_tasks(ServiceId::Housing).unwrap();
        store
            .set_relocation_profile(&ProfileUpdate {
                to_city: Some("Oslo".into()),
                ..Default::default()
            })
            .unwrap();

        let mut rx = store.events().subscribe();
        store.reset_all().unwrap();

        let snapshot = store.snapshot();
        assert!(snapshot.selected_services.is_empty());
        assert!(snapshot.tasks.is_empty());
        assert!(snapshot.profile.is_empty());

        let events = drain(&mut rx);
        let names: Vec<_> = events.iter().map(|e| e.event_name()).collect();
        assert_eq!(
            names,
            vec!["services_changed", "tasks_updated", "profile_changed", "plan_reset"]
        );
        for event in &events {
            match event {
                TimelineEvent::ServicesChanged { services, .. } => assert!(services.is_empty()),
                TimelineEvent::TasksUpdated { tasks, .. } => assert!(tasks.is_empty()),
                TimelineEvent::ProfileChanged { profile, .. } => assert!(profile.is_empty()),
                _ => {}
            }
        }
    }

    #[test]
    fn test_state_survives_reopen() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let keys = StorageConfig::default();
        {
            let store = TimelineStore::open(Arc::clone(&kv), &keys, EventBus::default());
            store
                .set_selected_services(&[ServiceId::Finances], false)
                .unwrap();
            store.build_service_tasks(ServiceId::Finances).unwrap();
            store
                .set_relocation_profile(&ProfileUpdate {
                    move_date: Some("2026-03-01".into()),
                    ..Default::default()
                })
                .unwrap();
        }

        let reopened = TimelineStore::open(kv, &keys, EventBus::default());
        let snapshot = reopened.snapshot();
        assert_eq!(snapshot.selected_services, vec![ServiceId::Finances]);
        assert_eq!(snapshot.tasks.len(), 3);
        assert_eq!(snapshot.profile.move_date.as_deref(), Some("2026-03-01"));
    }

    #[test]
    fn test_load_filters_unknown_entries() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let keys = StorageConfig::default();
        kv.persist(
            &keys.selected_services_key(),
            r#"["housing","teleportation","housing"]"#,
        )
        .unwrap();
        kv.persist(
            &keys.timeline_tasks_key(),
            r#"[{"id":"t1","serviceId":"housing","title":"Keep"},
                {"id":"t2","serviceId":"astrology","title":"Drop"},
                {"id":"t1","serviceId":"housing","title":"Duplicate"}]"#,
        )
        .unwrap();
        kv.persist(&keys.relocation_profile_key(), "not json").unwrap();

        let store = TimelineStore::open(kv, &keys, EventBus::default());
        let snapshot = store.snapshot();
        assert_eq!(snapshot.selected_services, vec![ServiceId::Housing]);
        assert_eq!(snapshot.tasks.len(), 1);
        assert_eq!(snapshot.tasks[0].title, "Keep");
        assert!(snapshot.profile.is_empty());
    }

    #[test]
    fn test_visible_tasks_follow_selection() {
        let store = TimelineStore::in_memory();
        store.upsert_task(bare_task("h", ServiceId::Housing)).unwrap();
        store.upsert_task(bare_task("m", ServiceId::Moving)).unwrap();
        store
            .set_selected_services(&[ServiceId::Moving], false)
            .unwrap();
        let snapshot = store.snapshot();
        let visible: Vec<_> = snapshot.visible_tasks().iter().map(|t| t.id.clone()).collect();
        assert_eq!(visible, vec!["m".to_string()]);
    }

    #[test]
    fn test_readers_keep_old_snapshot() {
        let store = TimelineStore::in_memory();
        let before = store.snapshot();
        store.build_service_tasks(ServiceId::Moving).unwrap();
        assert!(before.tasks.is_empty());
        assert_eq!(store.snapshot().tasks.len(), 3);
    }
}
