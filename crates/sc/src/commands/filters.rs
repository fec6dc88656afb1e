//! Filters command implementation.
//!
//! Lists and manages saved filters in the state file. Memberships persisted
//! for a filter are dropped when its tree changes or it is deleted, so the
//! next evaluation starts from scratch instead of serving a set computed for
//! the old tree.

use std::sync::Arc;

use collection_engine_rs::filter::FilterNode;
use collection_engine_rs::membership::PersistedMembership;
use collection_engine_rs::{
    DefinitionError, DefinitionStore, FilterDefinition, FilterDraft, FilterId, OwnerScope,
    PersistedState, SavedFilter, StateStore,
};
use collection_library_rs::models::{EntityKind, UserId};
use tracing::{debug, warn};

use super::{read_tree, CommandContext, Result};
use crate::output::{
    format_deleted_filter, format_filter_details_json, format_filter_details_table,
    format_filter_result, format_filters_json, format_filters_table,
};

/// Saved filters and memberships loaded from the state file.
pub struct FilterState {
    store: StateStore,
    definitions: DefinitionStore,
    memberships: Vec<PersistedMembership>,
}

impl FilterState {
    /// Loads the state file, or starts empty if it does not exist.
    pub fn open(store: StateStore) -> Result<Self> {
        let state = store.load_or_default()?;
        let definitions = DefinitionStore::new();
        for (id, error) in definitions.restore(state.filters) {
            warn!(%id, %error, "skipping invalid saved filter");
        }
        debug!(
            path = %store.path().display(),
            filters = definitions.len(),
            memberships = state.memberships.len(),
            "state loaded"
        );
        Ok(Self {
            store,
            definitions,
            memberships: state.memberships,
        })
    }

    /// The loaded definitions.
    pub fn definitions(&self) -> &DefinitionStore {
        &self.definitions
    }

    /// Persisted memberships of one filter.
    pub fn memberships_of(&self, id: FilterId) -> Vec<&PersistedMembership> {
        self.memberships
            .iter()
            .filter(|m| m.key.filter == id)
            .collect()
    }

    fn forget_memberships(&mut self, id: FilterId) {
        self.memberships.retain(|m| m.key.filter != id);
    }

    /// Writes definitions and the memberships of surviving filters back.
    pub fn save(self) -> Result<()> {
        let mut filters: Vec<SavedFilter> = self
            .definitions
            .all()
            .iter()
            .map(|d| SavedFilter::from(d.as_ref()))
            .collect();
        filters.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        let definitions = &self.definitions;
        let memberships: Vec<PersistedMembership> = self
            .memberships
            .into_iter()
            .filter(|m| definitions.get(m.key.filter).is_some())
            .collect();

        self.store
            .save(&PersistedState::new(filters, memberships))?;
        Ok(())
    }
}

/// Executes the filters list command.
pub fn execute_list(ctx: &CommandContext, viewer: Option<u64>) -> Result<()> {
    let state = FilterState::open(ctx.state_store()?)?;
    let filters = state.definitions().list(viewer.map(UserId));

    if ctx.json_output {
        println!("{}", format_filters_json(&filters)?);
    } else if !ctx.quiet {
        print!("{}", format_filters_table(&filters, ctx.use_colors));
    }

    Ok(())
}

/// Executes the filters show command.
pub fn execute_show(ctx: &CommandContext, id: FilterId) -> Result<()> {
    let state = FilterState::open(ctx.state_store()?)?;
    let definition = find(state.definitions(), id)?;
    let memberships = state.memberships_of(id);

    if ctx.json_output {
        println!("{}", format_filter_details_json(&definition, &memberships)?);
    } else if !ctx.quiet {
        print!(
            "{}",
            format_filter_details_table(&definition, &memberships, ctx.use_colors)
        );
    }

    Ok(())
}

/// Options for the filters add command.
#[derive(Debug)]
pub struct FiltersAddOptions {
    /// Filter name.
    pub name: String,
    /// Entity kind the filter selects from.
    pub target: EntityKind,
    /// Owning user, or global.
    pub owner: Option<u64>,
    /// Tree source (file path or `-`).
    pub tree: String,
}

/// Executes the filters add command.
pub fn execute_add(ctx: &CommandContext, opts: &FiltersAddOptions) -> Result<()> {
    let root = read_tree(&opts.tree)?;
    let state = FilterState::open(ctx.state_store()?)?;
    let definition = add_filter(&state, opts, root)?;
    let equivalents = equivalents_of(&state, &definition);
    state.save()?;

    if ctx.json_output {
        println!(
            "{}",
            format_filter_result("created", &definition, &equivalents)?
        );
    } else if !ctx.quiet {
        println!("Created filter: {} ({})", definition.name, definition.id);
        if ctx.verbose {
            println!("  Tree: {}", definition.root);
        }
        for other in &equivalents {
            println!("  Note: same tree as filter {other}");
        }
    }

    Ok(())
}

fn add_filter(
    state: &FilterState,
    opts: &FiltersAddOptions,
    root: FilterNode,
) -> Result<Arc<FilterDefinition>> {
    let owner = match opts.owner {
        Some(user) => OwnerScope::User(UserId(user)),
        None => OwnerScope::Global,
    };
    let draft = FilterDraft::new(opts.name.clone(), root)
        .owned_by(owner)
        .targeting(opts.target);
    Ok(state.definitions().create(draft)?)
}

fn equivalents_of(state: &FilterState, definition: &FilterDefinition) -> Vec<FilterId> {
    state
        .definitions()
        .equivalent(&definition.root)
        .into_iter()
        .filter(|id| *id != definition.id)
        .collect()
}

/// Executes the filters edit command.
pub fn execute_edit(ctx: &CommandContext, id: FilterId, tree: &str) -> Result<()> {
    let root = read_tree(tree)?;
    let mut state = FilterState::open(ctx.state_store()?)?;
    let outcome = state.definitions().update(id, root)?;

    let changed = outcome.is_changed();
    let definition = Arc::clone(outcome.current());
    if changed {
        state.forget_memberships(id);
        state.save()?;
    }

    if ctx.json_output {
        let action = if changed { "updated" } else { "unchanged" };
        println!("{}", format_filter_result(action, &definition, &[])?);
    } else if !ctx.quiet {
        if changed {
            println!("Updated filter: {} ({})", definition.name, definition.id);
        } else {
            println!("No changes to filter: {}", definition.name);
        }
    }

    Ok(())
}

/// Executes the filters rename command.
pub fn execute_rename(ctx: &CommandContext, id: FilterId, name: &str) -> Result<()> {
    let state = FilterState::open(ctx.state_store()?)?;
    let definition = state.definitions().rename(id, name)?;
    state.save()?;

    if ctx.json_output {
        println!("{}", format_filter_result("renamed", &definition, &[])?);
    } else if !ctx.quiet {
        println!("Renamed filter {} to: {}", definition.id, definition.name);
    }

    Ok(())
}

/// Executes the filters delete command.
pub fn execute_delete(ctx: &CommandContext, id: FilterId) -> Result<()> {
    let mut state = FilterState::open(ctx.state_store()?)?;
    let definition = state.definitions().delete(id)?;
    state.forget_memberships(id);
    state.save()?;

    if ctx.json_output {
        println!("{}", format_deleted_filter(&definition)?);
    } else if !ctx.quiet {
        println!("Deleted filter: {} ({})", definition.name, definition.id);
    }

    Ok(())
}

fn find(definitions: &DefinitionStore, id: FilterId) -> Result<Arc<FilterDefinition>> {
    Ok(definitions.get(id).ok_or(DefinitionError::NotFound(id))?)
}
