//! The recursive resolve algorithm
//!
//! Dispatches on column kind: leaf columns take the display-value fast
//! path, formulas fan their dependencies out across the coordinator and
//! recursion, mirrors deep-fetch their linked items and aggregate. Cycle
//! detection is a per-call-stack key set threaded as an explicit parameter;
//! re-entry yields the context-dependent cycle-break scalar.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;

use boardcalc_core::scalar::parse_number_lenient;
use boardcalc_core::{
    BoardId, ColumnDef, ColumnKind, Error, ItemId, MirrorFunction, ResolutionKey, Result, Scalar,
};
use boardcalc_formula::{evaluate_formula, extract_column_ids, Environment};

use crate::client::DeepMirrorRecord;
use crate::extract;
use crate::schema::BoardSchema;
use crate::session::SessionInner;
use crate::strategy;
use crate::SharedError;

/// Per-call-stack resolution context, threaded explicitly through the
/// recursion. Never session-wide.
#[derive(Debug, Clone, Default)]
pub(crate) struct ResolveCtx {
    stack: HashSet<ResolutionKey>,
    /// Whether the nearest aggregating ancestor is numeric; selects the
    /// cycle-break scalar.
    numeric: bool,
}

impl ResolveCtx {
    pub(crate) fn root() -> Self {
        Self::default()
    }

    fn on_stack(&self, key: &ResolutionKey) -> bool {
        self.stack.contains(key)
    }

    fn child(&self, key: &ResolutionKey) -> Self {
        let mut child = self.clone();
        child.stack.insert(key.clone());
        child
    }

    fn push(&mut self, key: ResolutionKey) {
        self.stack.insert(key);
    }

    fn with_numeric(&self, numeric: bool) -> Self {
        let mut ctx = self.clone();
        ctx.numeric = numeric;
        ctx
    }
}

/// Outcome of resolving one key. Cycle re-entry is distinguishable from a
/// real value so the enclosing computation can apply the context-dependent
/// cycle-break default; it is never cached (it depends on the call stack).
#[derive(Debug, Clone)]
pub(crate) enum Resolution {
    Value(Scalar),
    CycleReentry,
}

impl SessionInner {
    fn cycle_break(&self, ctx: &ResolveCtx) -> Scalar {
        if ctx.numeric {
            Scalar::Number(self.options.cycle_break_numeric_default)
        } else {
            Scalar::Empty
        }
    }

    /// Resolve one key: cycle check, value cache, in-flight dedup, then the
    /// actual computation. Any number of concurrent callers share one
    /// computation per key.
    pub(crate) fn resolve_key(
        self: Arc<Self>,
        key: ResolutionKey,
        ctx: ResolveCtx,
    ) -> BoxFuture<'static, Result<Resolution>> {
        Box::pin(async move {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            if ctx.on_stack(&key) {
                if self.options.debug_log {
                    tracing::debug!(?key, "cycle detected, breaking");
                }
                return Ok(Resolution::CycleReentry);
            }

            let shared = {
                let mut state = self.state.lock().unwrap();
                if let Some(value) = state.values.get(&key) {
                    return Ok(Resolution::Value(value.clone()));
                }
                match state.inflight.get(&key) {
                    Some(shared) => shared.clone(),
                    None => {
                        let child_ctx = ctx.child(&key);
                        let shared =
                            Arc::clone(&self).compute(key.clone(), child_ctx).shared();
                        state.inflight.insert(key.clone(), shared.clone());
                        shared
                    }
                }
            };

            match shared.await {
                Ok(value) => Ok(Resolution::Value(value)),
                Err(e) => Err(e.to_error()),
            }
        })
    }

    /// The per-key computation behind the in-flight map. Non-fatal failures
    /// degrade to empty here; fatal ones propagate to every subscriber.
    fn compute(
        self: Arc<Self>,
        key: ResolutionKey,
        ctx: ResolveCtx,
    ) -> BoxFuture<'static, std::result::Result<Scalar, SharedError>> {
        Box::pin(async move {
            let result = match self.schemas.column(key.board, &key.column).await {
                Ok(def) => match def.kind {
                    ColumnKind::Formula => {
                        Arc::clone(&self).resolve_formula(&key, &def, &ctx).await
                    }
                    ColumnKind::Mirror | ColumnKind::Lookup => {
                        Arc::clone(&self).resolve_mirror(&key, &def, &ctx).await
                    }
                    _ => self.resolve_leaf(&key, &def).await,
                },
                Err(e) => Err(e),
            };

            let mut state = self.state.lock().unwrap();
            state.inflight.remove(&key);
            match result {
                Ok(value) => {
                    state.values.insert(key, value.clone());
                    Ok(value)
                }
                Err(e) if e.is_fatal() => Err(SharedError::new(e)),
                Err(e) => {
                    tracing::warn!(
                        board = key.board,
                        column = %key.column,
                        item = key.item,
                        error = %e,
                        "resolution degraded to empty"
                    );
                    state.values.insert(key, Scalar::Empty);
                    Ok(Scalar::Empty)
                }
            }
        })
    }

    /// Leaf columns: display-value fast path with a second-chance numeric
    /// fetch for numeric kinds.
    async fn resolve_leaf(&self, key: &ResolutionKey, def: &ColumnDef) -> Result<Scalar> {
        let record = self
            .queries
            .display_value(key.board, key.item, &key.column)
            .await?;
        let scalar = extract::display_record(def, &record);
        if !scalar.is_empty() {
            return Ok(scalar);
        }

        if def.kind.is_numeric() {
            let records = self
                .queries
                .item_columns_deep(key.board, key.item, vec![key.column.clone()])
                .await?;
            if let Some(record) = records.into_iter().find(|r| r.column_id == key.column) {
                return Ok(extract::registry().extract(def, &record.value));
            }
        }

        Ok(extract::default_for(def))
    }

    /// Formula columns: probe the cached display value when strategy allows,
    /// then fan dependencies out across the coordinator and recursion.
    async fn resolve_formula(
        self: Arc<Self>,
        key: &ResolutionKey,
        def: &ColumnDef,
        ctx: &ResolveCtx,
    ) -> Result<Scalar> {
        let source = def.settings.formula.clone().unwrap_or_default();
        if source.trim().is_empty() {
            return Ok(Scalar::Empty);
        }

        let deps = extract_column_ids(&source);
        if deps.is_empty() {
            return Ok(evaluate_formula(&source, &Environment::new()));
        }

        let schema = self.schemas.board(key.board).await?;
        let plan = strategy::plan_formula(deps.iter(), &schema);
        if self.options.debug_log {
            tracing::debug!(
                column = %key.column,
                batched = plan.batched.len(),
                recursive = plan.recursive.len(),
                probe = plan.probe_display_value,
                "formula plan"
            );
        }

        if plan.probe_display_value {
            let record = self
                .queries
                .display_value(key.board, key.item, &key.column)
                .await?;
            let display = record
                .display_value
                .as_deref()
                .or(record.text.as_deref())
                .map(str::trim)
                .filter(|s| !s.is_empty());
            if let Some(n) = display.and_then(parse_number_lenient) {
                return Ok(Scalar::Number(n));
            }
        }

        let resolutions = deps.iter().map(|dep| {
            let this = Arc::clone(&self);
            let dep = dep.clone();
            let via_coordinator = plan.batched.contains(&dep);
            let key = key.clone();
            let ctx = ctx.clone();
            let schema = Arc::clone(&schema);
            async move {
                let value = this
                    .resolve_dependency(&key, &schema, &dep, via_coordinator, &ctx)
                    .await;
                (dep, value)
            }
        });

        let mut env = Environment::new();
        for (dep, result) in join_all(resolutions).await {
            match result {
                Ok(Resolution::Value(value)) => env.insert(dep, value),
                // A dependency re-entered this stack: the whole formula
                // collapses to the cycle-break default
                Ok(Resolution::CycleReentry) => return Ok(self.cycle_break(ctx)),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    tracing::warn!(
                        column = %key.column,
                        dep = %dep,
                        error = %e,
                        "dependency failed, using fallback"
                    );
                    let fallback = schema
                        .column(&dep)
                        .map(extract::default_for)
                        .unwrap_or(Scalar::Empty);
                    env.insert(dep, fallback);
                }
            }
        }

        Ok(evaluate_formula(&source, &env))
    }

    /// One formula dependency: simple kinds go through the coordinator's
    /// batched deep query; complex kinds, and values the coordinator
    /// returned empty for, recurse.
    async fn resolve_dependency(
        self: Arc<Self>,
        key: &ResolutionKey,
        schema: &BoardSchema,
        dep: &str,
        via_coordinator: bool,
        ctx: &ResolveCtx,
    ) -> Result<Resolution> {
        if via_coordinator {
            match self.coordinator.request(key.board, key.item, dep).await {
                Ok(Some(value)) => {
                    if let Some(dep_def) = schema.column(dep) {
                        let scalar = extract::registry().extract(dep_def, &value);
                        if !scalar.is_empty() {
                            return Ok(Resolution::Value(scalar));
                        }
                    }
                }
                Ok(None) => {}
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    tracing::warn!(dep = %dep, error = %e, "coordinator fetch failed, recursing");
                }
            }
        }

        self.resolve_key(
            ResolutionKey::new(key.board, dep, key.item),
            ctx.clone(),
        )
        .await
    }

    /// Mirror columns: one deep fetch; trust a usable cached display value,
    /// otherwise recurse into the linked items grouped by target board.
    async fn resolve_mirror(
        self: Arc<Self>,
        key: &ResolutionKey,
        def: &ColumnDef,
        ctx: &ResolveCtx,
    ) -> Result<Scalar> {
        let function = def.settings.function;
        let record = self
            .queries
            .deep_mirror(key.board, key.item, &key.column)
            .await?;

        if let Some(scalar) = mirror_display_scalar(&record, function, &key.column) {
            return Ok(scalar);
        }

        let target_column = def
            .settings
            .displayed_linked_columns
            .first()
            .and_then(|t| t.column_ids.first())
            .cloned();
        let target_column = match target_column {
            Some(c) if !record.mirrored_items.is_empty() => c,
            _ => return Ok(empty_mirror_result(function)),
        };

        let mut groups: HashMap<BoardId, Vec<ItemId>> = HashMap::new();
        for mirrored in &record.mirrored_items {
            let items = groups.entry(mirrored.linked_board_id).or_default();
            if !items.contains(&mirrored.linked_item.id) {
                items.push(mirrored.linked_item.id);
            }
        }

        let child_ctx = ctx.with_numeric(function.is_numeric());
        let group_futures = groups.into_iter().map(|(board, items)| {
            let this = Arc::clone(&self);
            let column = target_column.clone();
            let ctx = child_ctx.clone();
            async move { (board, this.resolve_batch_inner(board, column, items, ctx).await) }
        });

        let mut resolved: HashMap<(BoardId, ItemId), Scalar> = HashMap::new();
        for (board, result) in join_all(group_futures).await {
            match result {
                Ok(map) => {
                    resolved.extend(map.into_iter().map(|(item, v)| ((board, item), v)));
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    tracing::warn!(board, error = %e, "linked board resolution failed");
                }
            }
        }

        // Aggregation preserves the upstream linked-items order
        let children: Vec<Scalar> = record
            .mirrored_items
            .iter()
            .filter_map(|m| resolved.get(&(m.linked_board_id, m.linked_item.id)).cloned())
            .filter(|v| !v.is_empty())
            .collect();

        Ok(aggregate_children(children, function))
    }

    /// Batched resolution of one column across many items. Threads the
    /// cycle context so nested mirror recursion stays bounded.
    pub(crate) fn resolve_batch_inner(
        self: Arc<Self>,
        board: BoardId,
        column: String,
        items: Vec<ItemId>,
        ctx: ResolveCtx,
    ) -> BoxFuture<'static, Result<HashMap<ItemId, Scalar>>> {
        Box::pin(async move {
            let mut out = HashMap::with_capacity(items.len());
            let mut residual = Vec::new();
            {
                let state = self.state.lock().unwrap();
                for &item in &items {
                    let item_key = ResolutionKey::new(board, column.clone(), item);
                    if ctx.on_stack(&item_key) {
                        out.insert(item, self.cycle_break(&ctx));
                    } else if let Some(value) = state.values.get(&item_key) {
                        out.insert(item, value.clone());
                    } else {
                        residual.push(item);
                    }
                }
            }
            if residual.is_empty() {
                return Ok(out);
            }

            let def = match self.schemas.column(board, &column).await {
                Ok(def) => def,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(board, column = %column, error = %e, "batch degraded to empty");
                    out.extend(residual.into_iter().map(|item| (item, Scalar::Empty)));
                    return Ok(out);
                }
            };

            match def.kind {
                ColumnKind::Mirror | ColumnKind::Lookup => {
                    Arc::clone(&self)
                        .resolve_mirror_batch(board, &column, &def, residual, &ctx, &mut out)
                        .await?;
                }
                _ => {
                    Arc::clone(&self)
                        .resolve_plain_batch(board, &column, &def, residual, &ctx, &mut out)
                        .await?;
                }
            }

            let mut state = self.state.lock().unwrap();
            for (item, value) in &out {
                state
                    .values
                    .entry(ResolutionKey::new(board, column.clone(), *item))
                    .or_insert_with(|| value.clone());
            }

            Ok(out)
        })
    }

    /// Leaf and formula columns in batch: one batched display-value
    /// prefetch when strategy allows, then the single-item algorithm for
    /// the residual set.
    async fn resolve_plain_batch(
        self: Arc<Self>,
        board: BoardId,
        column: &str,
        def: &ColumnDef,
        items: Vec<ItemId>,
        ctx: &ResolveCtx,
        out: &mut HashMap<ItemId, Scalar>,
    ) -> Result<()> {
        let prefetch = match def.kind {
            ColumnKind::Formula => {
                let source = def.settings.formula.clone().unwrap_or_default();
                let deps = extract_column_ids(&source);
                if deps.is_empty() {
                    false
                } else {
                    let schema = self.schemas.board(board).await?;
                    strategy::plan_formula(deps.iter(), &schema).probe_display_value
                }
            }
            _ => true,
        };

        let mut leftover = items;
        if prefetch {
            let records = self
                .queries
                .display_value_batch(board, &leftover, column)
                .await?;
            let mut rest = Vec::new();
            for item in leftover {
                let finished = records.get(&item).and_then(|record| {
                    if def.kind == ColumnKind::Formula {
                        // Only a numeric-looking cached value wins for formulas
                        record
                            .display_value
                            .as_deref()
                            .or(record.text.as_deref())
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .and_then(parse_number_lenient)
                            .map(Scalar::Number)
                    } else {
                        let scalar = extract::display_record(def, record);
                        (!scalar.is_empty()).then_some(scalar)
                    }
                });
                match finished {
                    Some(value) => {
                        out.insert(item, value);
                    }
                    None => rest.push(item),
                }
            }
            leftover = rest;
        }

        let singles = leftover.into_iter().map(|item| {
            let this = Arc::clone(&self);
            let key = ResolutionKey::new(board, column, item);
            let ctx = ctx.clone();
            async move { (item, this.resolve_key(key, ctx).await) }
        });
        for (item, result) in join_all(singles).await {
            let value = match result? {
                Resolution::Value(value) => value,
                Resolution::CycleReentry => self.cycle_break(ctx),
            };
            out.insert(item, value);
        }

        Ok(())
    }

    /// Mirror columns in batch: optional display-value prefetch (only when
    /// the target column is simple), parallel deep-mirror fetches, then one
    /// nested batched resolve per target board.
    async fn resolve_mirror_batch(
        self: Arc<Self>,
        board: BoardId,
        column: &str,
        def: &ColumnDef,
        items: Vec<ItemId>,
        ctx: &ResolveCtx,
        out: &mut HashMap<ItemId, Scalar>,
    ) -> Result<()> {
        let function = def.settings.function;

        let target_board = def
            .settings
            .displayed_linked_columns
            .first()
            .map(|t| t.board_id);
        let target_schema = target_board.and_then(|b| self.schemas.cached(b));
        let mut leftover = items;

        if strategy::mirror_fast_path_usable(&def.settings, target_schema.as_deref()) {
            let records = self
                .queries
                .display_value_batch(board, &leftover, column)
                .await?;
            let mut rest = Vec::new();
            for item in leftover {
                let finished = records.get(&item).and_then(|record| {
                    let dv = record.display_value.as_deref().map(str::trim)?;
                    if dv.is_empty() {
                        return None;
                    }
                    Some(aggregate_display_list(dv, function, column))
                });
                match finished {
                    Some(value) => {
                        out.insert(item, value);
                    }
                    None => rest.push(item),
                }
            }
            leftover = rest;
        }
        if leftover.is_empty() {
            return Ok(());
        }

        let deep = leftover.into_iter().map(|item| {
            let this = Arc::clone(&self);
            let column = column.to_string();
            async move {
                (
                    item,
                    this.queries.deep_mirror(board, item, &column).await,
                )
            }
        });

        let mut pending: Vec<(ItemId, DeepMirrorRecord)> = Vec::new();
        for (item, record) in join_all(deep).await {
            let record = record?;
            match mirror_display_scalar(&record, function, column) {
                Some(value) => {
                    out.insert(item, value);
                }
                None => pending.push((item, record)),
            }
        }
        if pending.is_empty() {
            return Ok(());
        }

        let target_column = def
            .settings
            .displayed_linked_columns
            .first()
            .and_then(|t| t.column_ids.first())
            .cloned();
        let target_column = match target_column {
            Some(c) => c,
            None => {
                for (item, _) in pending {
                    out.insert(item, empty_mirror_result(function));
                }
                return Ok(());
            }
        };

        // All pending mirror keys join the child stack so cross-item
        // recursion through this batch cannot re-enter it
        let mut child_ctx = ctx.with_numeric(function.is_numeric());
        for (item, _) in &pending {
            child_ctx.push(ResolutionKey::new(board, column, *item));
        }

        let mut groups: HashMap<BoardId, Vec<ItemId>> = HashMap::new();
        for (_, record) in &pending {
            for mirrored in &record.mirrored_items {
                let group = groups.entry(mirrored.linked_board_id).or_default();
                if !group.contains(&mirrored.linked_item.id) {
                    group.push(mirrored.linked_item.id);
                }
            }
        }

        let group_futures = groups.into_iter().map(|(target, target_items)| {
            let this = Arc::clone(&self);
            let column = target_column.clone();
            let ctx = child_ctx.clone();
            async move {
                (
                    target,
                    this.resolve_batch_inner(target, column, target_items, ctx).await,
                )
            }
        });

        let mut resolved: HashMap<(BoardId, ItemId), Scalar> = HashMap::new();
        for (target, result) in join_all(group_futures).await {
            match result {
                Ok(map) => {
                    resolved.extend(map.into_iter().map(|(item, v)| ((target, item), v)));
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    tracing::warn!(board = target, error = %e, "linked board resolution failed");
                }
            }
        }

        for (item, record) in pending {
            let children: Vec<Scalar> = record
                .mirrored_items
                .iter()
                .filter_map(|m| resolved.get(&(m.linked_board_id, m.linked_item.id)).cloned())
                .filter(|v| !v.is_empty())
                .collect();
            out.insert(item, aggregate_children(children, function));
        }

        Ok(())
    }
}

/// Interpret a deep-mirror record's cached display value: a comma-separated
/// numeric list aggregates, a single number passes through, non-empty text
/// passes through as text. `None` means the recursive pass is needed.
fn mirror_display_scalar(
    record: &DeepMirrorRecord,
    function: MirrorFunction,
    column: &str,
) -> Option<Scalar> {
    let dv = record.display_value.as_deref().map(str::trim)?;
    if dv.is_empty() {
        return None;
    }
    Some(aggregate_display_list(dv, function, column))
}

fn aggregate_display_list(dv: &str, function: MirrorFunction, column: &str) -> Scalar {
    if let Some(numbers) = extract::parse_numeric_list(dv) {
        if numbers.len() == 1 {
            return Scalar::Number(numbers[0]);
        }
        return Scalar::Number(function.apply(&numbers));
    }
    if function.is_numeric() {
        tracing::warn!(
            column = %column,
            display_value = %dv,
            "non-numeric display value under numeric aggregation, passing through as text"
        );
    }
    Scalar::text(dv)
}

/// Aggregate recursively resolved mirror children: all-numeric applies the
/// aggregation, anything else comma-joins, nothing at all takes the numeric
/// default when the aggregation is numeric.
fn aggregate_children(children: Vec<Scalar>, function: MirrorFunction) -> Scalar {
    if children.is_empty() {
        return empty_mirror_result(function);
    }
    let numbers: Option<Vec<f64>> = children.iter().map(aggregatable_number).collect();
    match numbers {
        Some(numbers) => Scalar::Number(function.apply(&numbers)),
        None => Scalar::Text(
            children
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        ),
    }
}

fn aggregatable_number(value: &Scalar) -> Option<f64> {
    match value {
        Scalar::Number(n) => Some(*n),
        Scalar::Text(s) => parse_number_lenient(s),
        _ => None,
    }
}

fn empty_mirror_result(function: MirrorFunction) -> Scalar {
    if function.is_numeric() {
        Scalar::Number(0.0)
    } else {
        Scalar::Empty
    }
}
