//! Task enrichment: attaching interactive actions to matching tasks.
//!
//! Enrichment is a pure function of the task list and the relocation profile.
//! It is re-run after every store mutation instead of being persisted as a
//! flag, so edits to the rule table apply to existing plans.
//!
//! Merging rules:
//! - A rule applies when any of its `id`, `template_slug`, `title`, or
//!   `service_id` fields equals the task's.
//! - An action is skipped when its de-duplication key is already present on
//!   the task through a manual addition.
//! - A task never gains research actions beyond [`MAX_RESEARCH_ACTIONS`].
//! - Actions attached by rules are tracked in `Task::rule_actions` and
//!   re-rendered from the rule table on every pass, so placeholders always
//!   reflect the current profile. They keep their position in the list;
//!   rule actions that no longer apply are dropped.

pub mod placeholders;
mod rules;

use std::collections::{HashMap, HashSet};

use relocation_core::{ServiceId, Task, TaskAction};

use placeholders::PlaceholderValues;

/// Upper bound on research actions per task after enrichment.
pub const MAX_RESEARCH_ACTIONS: usize = 2;

/// Contributes `actions` to every task matching one of its criteria.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentRule {
    pub id: Option<&'static str>,
    pub template_slug: Option<&'static str>,
    pub title: Option<&'static str>,
    pub service_id: Option<ServiceId>,
    pub actions: Vec<TaskAction>,
}

impl EnrichmentRule {
    pub fn for_template(slug: &'static str, actions: Vec<TaskAction>) -> Self {
        Self {
            template_slug: Some(slug),
            actions,
            ..Default::default()
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.id.is_some_and(|id| id == task.id)
            || self
                .template_slug
                .is_some_and(|slug| task.template_slug.as_deref() == Some(slug))
            || self.title.is_some_and(|title| title == task.title)
            || self.service_id.is_some_and(|service| service == task.service_id)
    }
}

/// The built-in rule table.
pub fn default_rules() -> &'static [EnrichmentRule] {
    &rules::DEFAULT_RULES
}

/// Enrich one task with the built-in rules.
pub fn enrich_task(task: Task, values: &PlaceholderValues) -> Task {
    apply_rules(task, default_rules(), values)
}

/// Enrich every task with the built-in rules, preserving order.
pub fn enrich_tasks(tasks: Vec<Task>, values: &PlaceholderValues) -> Vec<Task> {
    tasks
        .into_iter()
        .map(|task| enrich_task(task, values))
        .collect()
}

/// Merge the actions of every rule in `rules` that matches `task`.
pub fn apply_rules(mut task: Task, rules: &[EnrichmentRule], values: &PlaceholderValues) -> Task {
    let owned: HashSet<String> = std::mem::take(&mut task.rule_actions).into_iter().collect();
    let manual = task
        .actions
        .iter()
        .filter(|action| !owned.contains(&action.dedup_key()));
    let mut research_count = manual.clone().filter(|action| action.is_research()).count();
    let mut keys: HashSet<String> = manual.map(TaskAction::dedup_key).collect();

    let matching: Vec<&EnrichmentRule> = rules.iter().filter(|rule| rule.matches(&task)).collect();
    let mut generated: Vec<(String, TaskAction)> = Vec::new();
    for action in matching.iter().flat_map(|rule| rule.actions.iter()) {
        let rendered = action.map_text(|text| values.render(text));
        let key = rendered.dedup_key();
        if keys.contains(&key) {
            continue;
        }
        if rendered.is_research() {
            if research_count >= MAX_RESEARCH_ACTIONS {
                continue;
            }
            research_count += 1;
        }
        keys.insert(key.clone());
        generated.push((key, rendered));
    }

    task.rule_actions = generated.iter().map(|(key, _)| key.clone()).collect();
    let mut fresh: HashMap<String, TaskAction> = HashMap::with_capacity(generated.len());
    let mut order: Vec<String> = Vec::with_capacity(generated.len());
    for (key, action) in generated {
        order.push(key.clone());
        fresh.insert(key, action);
    }

    let previous = std::mem::take(&mut task.actions);
    for action in previous {
        let key = action.dedup_key();
        if !owned.contains(&key) {
            task.actions.push(action);
        } else if let Some(replacement) = fresh.remove(&key) {
            task.actions.push(replacement);
        }
    }
    for key in order {
        if let Some(action) = fresh.remove(&key) {
            task.actions.push(action);
        }
    }
    task
}
