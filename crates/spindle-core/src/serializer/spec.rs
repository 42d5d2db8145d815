//! Specification graph to and from durable records.
//!
//! Serializing emits each named node once, with edges as names. Loading is
//! two-pass: every node is built first (edges left empty, names kept in a
//! pending table), then every edge name is resolved against the finished
//! name index. Loops such as `A -> B -> A` need the second pass.

use spindle_types::graph::{START, SpecRef, WorkflowSpec};
use spindle_types::spec::{ChoiceSettings, JoinSettings, SpecKind, TaskSpec, TriggerSettings};

use super::expression::{deserialize_operand, serialize_operand};
use super::record::{
    ChoiceRecord, ExclusiveChoiceRecord, JoinRecord, KindRecord, SpecGraphRecord, SpecRecordMap,
    TaskSpecRecord, TriggerRecord,
};
use super::{SerializerError, WorkflowSerializer};

const SUBWORKFLOW_WARNING: &str =
    "SubWorkflow specs only store a path to an external definition and cannot be round-tripped safely";

impl WorkflowSerializer {
    // -----------------------------------------------------------------------
    // Serialize
    // -----------------------------------------------------------------------

    /// Serialize one node: shared base fields plus its variant fields.
    pub fn serialize_task_spec(
        &self,
        graph: &WorkflowSpec,
        handle: SpecRef,
    ) -> Result<TaskSpecRecord, SerializerError> {
        let spec = &graph[handle];
        let context = |field: &str| format!("spec '{}' {field}", spec.name);

        Ok(TaskSpecRecord {
            id: spec.id.clone(),
            name: spec.name.clone(),
            description: spec.description.clone(),
            manual: spec.manual,
            internal: spec.internal,
            lookahead: spec.lookahead,
            inputs: graph.names_of(&spec.inputs).map(str::to_string).collect(),
            outputs: graph.names_of(&spec.outputs).map(str::to_string).collect(),
            data: self
                .codec
                .encode_map(&spec.data)
                .map_err(SerializerError::corrupt(context("data")))?,
            defines: self
                .codec
                .encode_map(&spec.defines)
                .map_err(SerializerError::corrupt(context("defines")))?,
            pre_assign: self
                .codec
                .encode_assigns(&spec.pre_assign)
                .map_err(SerializerError::corrupt(context("pre_assign")))?,
            post_assign: self
                .codec
                .encode_assigns(&spec.post_assign)
                .map_err(SerializerError::corrupt(context("post_assign")))?,
            locks: spec.locks.clone(),
            kind: self.serialize_kind(spec)?,
        })
    }

    fn serialize_kind(&self, spec: &TaskSpec) -> Result<KindRecord, SerializerError> {
        let context = |field: &str| format!("spec '{}' {field}", spec.name);
        let record = match &spec.kind {
            SpecKind::Simple => KindRecord::Simple,
            SpecKind::StartTask => KindRecord::StartTask,
            SpecKind::ThreadStart => KindRecord::ThreadStart,
            SpecKind::Cancel { cancel_successfully } => KindRecord::Cancel {
                cancel_successfully: *cancel_successfully,
            },
            SpecKind::AcquireMutex { mutex } => KindRecord::AcquireMutex {
                mutex: mutex.clone(),
            },
            SpecKind::ReleaseMutex { mutex } => KindRecord::ReleaseMutex {
                mutex: mutex.clone(),
            },
            SpecKind::Join(join) => KindRecord::Join(serialize_join(join)?),
            SpecKind::ThreadMerge(join) => KindRecord::ThreadMerge(serialize_join(join)?),
            SpecKind::Merge(join) => KindRecord::Merge(serialize_join(join)?),
            SpecKind::MultiChoice(choice) => KindRecord::MultiChoice(ChoiceRecord {
                cond_task_specs: serialize_conditions(choice)?,
                choice: choice.choice.clone(),
            }),
            SpecKind::ExclusiveChoice {
                choice,
                default_task_spec,
            } => KindRecord::ExclusiveChoice(ExclusiveChoiceRecord {
                cond_task_specs: serialize_conditions(choice)?,
                choice: choice.choice.clone(),
                default_task_spec: default_task_spec.clone(),
            }),
            SpecKind::Choose { context, choice } => KindRecord::Choose {
                context: context.clone(),
                choice: choice.clone(),
            },
            SpecKind::Gate { context } => KindRecord::Gate {
                context: context.clone(),
            },
            SpecKind::MultiInstance { times } => KindRecord::MultiInstance {
                times: serialize_operand(times)?,
            },
            SpecKind::ThreadSplit { times } => KindRecord::ThreadSplit {
                times: serialize_operand(times)?,
            },
            SpecKind::Trigger(trigger) => KindRecord::Trigger(serialize_trigger(trigger)?),
            SpecKind::CancelTask(trigger) => KindRecord::CancelTask(serialize_trigger(trigger)?),
            SpecKind::Execute { args } => KindRecord::Execute { args: args.clone() },
            SpecKind::Celery {
                call,
                args,
                kwargs,
                result_key,
            } => KindRecord::Celery {
                call: call.clone(),
                args: self
                    .codec
                    .encode_list(args)
                    .map_err(SerializerError::corrupt(context("args")))?,
                kwargs: self
                    .codec
                    .encode_map(kwargs)
                    .map_err(SerializerError::corrupt(context("kwargs")))?,
                result_key: result_key.clone(),
            },
            SpecKind::SubWorkflow {
                file,
                in_assign,
                out_assign,
            } => {
                tracing::warn!(spec = %spec.name, file = %file, "{SUBWORKFLOW_WARNING}");
                KindRecord::SubWorkflow {
                    file: file.clone(),
                    in_assign: self
                        .codec
                        .encode_assigns(in_assign)
                        .map_err(SerializerError::corrupt(context("in_assign")))?,
                    out_assign: self
                        .codec
                        .encode_assigns(out_assign)
                        .map_err(SerializerError::corrupt(context("out_assign")))?,
                }
            }
        };
        Ok(record)
    }

    /// Serialize every named node of the graph.
    pub fn serialize_workflow_spec(
        &self,
        graph: &WorkflowSpec,
    ) -> Result<SpecGraphRecord, SerializerError> {
        let task_specs = graph
            .named()
            .map(|(name, handle)| Ok((name.to_string(), self.serialize_task_spec(graph, handle)?)))
            .collect::<Result<_, SerializerError>>()?;

        Ok(SpecGraphRecord {
            name: graph.name.clone(),
            description: graph.description.clone(),
            source: graph.file.clone(),
            task_specs: SpecRecordMap(task_specs),
        })
    }

    // -----------------------------------------------------------------------
    // Deserialize
    // -----------------------------------------------------------------------

    /// Rebuild a node without its edges.
    pub fn deserialize_task_spec(&self, record: &TaskSpecRecord) -> Result<TaskSpec, SerializerError> {
        let context = |field: &str| format!("spec '{}' {field}", record.name);
        let mut spec = TaskSpec::new(record.name.clone(), self.deserialize_kind(record)?);
        spec.id = record.id.clone();
        spec.description = record.description.clone();
        spec.manual = record.manual;
        spec.internal = record.internal;
        spec.lookahead = record.lookahead;
        spec.data = self
            .codec
            .decode_map(&record.data)
            .map_err(SerializerError::corrupt(context("data")))?;
        spec.defines = self
            .codec
            .decode_map(&record.defines)
            .map_err(SerializerError::corrupt(context("defines")))?;
        spec.pre_assign = self
            .codec
            .decode_assigns(&record.pre_assign)
            .map_err(SerializerError::corrupt(context("pre_assign")))?;
        spec.post_assign = self
            .codec
            .decode_assigns(&record.post_assign)
            .map_err(SerializerError::corrupt(context("post_assign")))?;
        spec.locks = record.locks.clone();
        Ok(spec)
    }

    fn deserialize_kind(&self, record: &TaskSpecRecord) -> Result<SpecKind, SerializerError> {
        let registry = self.codec.registry();
        let context = |field: &str| format!("spec '{}' {field}", record.name);
        let kind = match &record.kind {
            KindRecord::Simple => SpecKind::Simple,
            KindRecord::StartTask => SpecKind::StartTask,
            KindRecord::ThreadStart => SpecKind::ThreadStart,
            KindRecord::Cancel { cancel_successfully } => SpecKind::Cancel {
                cancel_successfully: *cancel_successfully,
            },
            KindRecord::AcquireMutex { mutex } => SpecKind::AcquireMutex {
                mutex: mutex.clone(),
            },
            KindRecord::ReleaseMutex { mutex } => SpecKind::ReleaseMutex {
                mutex: mutex.clone(),
            },
            KindRecord::Join(join) => SpecKind::Join(self.deserialize_join(join)?),
            KindRecord::ThreadMerge(join) => SpecKind::ThreadMerge(self.deserialize_join(join)?),
            KindRecord::Merge(join) => SpecKind::Merge(self.deserialize_join(join)?),
            KindRecord::MultiChoice(choice) => SpecKind::MultiChoice(ChoiceSettings {
                cond_task_specs: self.deserialize_conditions(&choice.cond_task_specs)?,
                choice: choice.choice.clone(),
            }),
            KindRecord::ExclusiveChoice(choice) => SpecKind::ExclusiveChoice {
                choice: ChoiceSettings {
                    cond_task_specs: self.deserialize_conditions(&choice.cond_task_specs)?,
                    choice: choice.choice.clone(),
                },
                default_task_spec: choice.default_task_spec.clone(),
            },
            KindRecord::Choose { context, choice } => SpecKind::Choose {
                context: context.clone(),
                choice: choice.clone(),
            },
            KindRecord::Gate { context } => SpecKind::Gate {
                context: context.clone(),
            },
            KindRecord::MultiInstance { times } => SpecKind::MultiInstance {
                times: deserialize_operand(times, registry)?,
            },
            KindRecord::ThreadSplit { times } => SpecKind::ThreadSplit {
                times: deserialize_operand(times, registry)?,
            },
            KindRecord::Trigger(trigger) => SpecKind::Trigger(self.deserialize_trigger(trigger)?),
            KindRecord::CancelTask(trigger) => {
                SpecKind::CancelTask(self.deserialize_trigger(trigger)?)
            }
            KindRecord::Execute { args } => SpecKind::Execute { args: args.clone() },
            KindRecord::Celery {
                call,
                args,
                kwargs,
                result_key,
            } => SpecKind::Celery {
                call: call.clone(),
                args: self
                    .codec
                    .decode_list(args)
                    .map_err(SerializerError::corrupt(context("args")))?,
                kwargs: self
                    .codec
                    .decode_map(kwargs)
                    .map_err(SerializerError::corrupt(context("kwargs")))?,
                result_key: result_key.clone(),
            },
            KindRecord::SubWorkflow {
                file,
                in_assign,
                out_assign,
            } => {
                tracing::warn!(spec = %record.name, file = %file, "{SUBWORKFLOW_WARNING}");
                SpecKind::SubWorkflow {
                    file: file.clone(),
                    in_assign: self
                        .codec
                        .decode_assigns(in_assign)
                        .map_err(SerializerError::corrupt(context("in_assign")))?,
                    out_assign: self
                        .codec
                        .decode_assigns(out_assign)
                        .map_err(SerializerError::corrupt(context("out_assign")))?,
                }
            }
        };
        Ok(kind)
    }

    fn deserialize_join(&self, record: &JoinRecord) -> Result<JoinSettings, SerializerError> {
        Ok(JoinSettings {
            split_task: record.split_task.clone(),
            threshold: record
                .threshold
                .as_ref()
                .map(|t| deserialize_operand(t, self.codec.registry()))
                .transpose()?,
            cancel_remaining: record.cancel_remaining,
        })
    }

    fn deserialize_conditions(
        &self,
        records: &[(super::record::ExprRecord, String)],
    ) -> Result<Vec<(spindle_types::operator::Operand, String)>, SerializerError> {
        records
            .iter()
            .map(|(cond, target)| Ok((deserialize_operand(cond, self.codec.registry())?, target.clone())))
            .collect()
    }

    fn deserialize_trigger(&self, record: &TriggerRecord) -> Result<TriggerSettings, SerializerError> {
        Ok(TriggerSettings {
            context: record.context.clone(),
            times: deserialize_operand(&record.times, self.codec.registry())?,
            queued: record.queued,
        })
    }

    /// Rebuild a whole graph.
    ///
    /// Fails with `MalformedGraph` unless exactly one `StartTask` named
    /// `Start` exists, and with `MissingSpec` when an edge names a node
    /// that is not in the record.
    pub fn deserialize_workflow_spec(
        &self,
        record: &SpecGraphRecord,
    ) -> Result<WorkflowSpec, SerializerError> {
        let start_record = record.task_specs.get(START).ok_or_else(|| {
            SerializerError::MalformedGraph(format!("'{}' has no '{START}' task spec", record.name))
        })?;
        if start_record.kind != KindRecord::StartTask {
            return Err(SerializerError::MalformedGraph(format!(
                "'{START}' must be a StartTask"
            )));
        }
        for (key, spec_record) in record.task_specs.iter() {
            if *key != spec_record.name {
                return Err(SerializerError::MalformedGraph(format!(
                    "key '{key}' holds task spec named '{}'",
                    spec_record.name
                )));
            }
            if key != START && spec_record.kind == KindRecord::StartTask {
                return Err(SerializerError::MalformedGraph(format!(
                    "more than one start task: '{key}'"
                )));
            }
        }

        // First pass: build every node, keep edge names for later.
        let mut graph =
            WorkflowSpec::with_start(record.name.clone(), self.deserialize_task_spec(start_record)?)?;
        graph.description = record.description.clone();
        graph.file = record.source.clone();

        let mut pending = vec![(graph.start(), start_record)];
        for (name, spec_record) in record.task_specs.iter() {
            if name == START {
                continue;
            }
            let handle = graph.insert(self.deserialize_task_spec(spec_record)?)?;
            pending.push((handle, spec_record));
        }

        // Second pass: resolve edge names.
        for (handle, spec_record) in pending {
            let inputs = resolve_edges(&graph, &spec_record.inputs, &spec_record.name)?;
            let outputs = resolve_edges(&graph, &spec_record.outputs, &spec_record.name)?;
            graph[handle].inputs = inputs;
            graph[handle].outputs = outputs;
        }

        if graph.by_name(START) != Some(graph.start()) {
            return Err(SerializerError::MalformedGraph(format!(
                "'{START}' does not resolve to the graph root"
            )));
        }
        graph.check_edges()?;

        let unreachable = graph.unreachable();
        if !unreachable.is_empty() {
            tracing::debug!(spec = %graph.name, ?unreachable, "task specs not reachable from Start");
        }
        tracing::debug!(spec = %graph.name, nodes = graph.named_len(), "deserialized workflow spec");
        Ok(graph)
    }
}

fn resolve_edges(graph: &WorkflowSpec, names: &[String], owner: &str) -> Result<Vec<SpecRef>, SerializerError> {
    names
        .iter()
        .map(|name| {
            graph
                .by_name(name)
                .ok_or_else(|| SerializerError::MissingSpec(format!("{name} (edge of '{owner}')")))
        })
        .collect()
}

fn serialize_join(join: &JoinSettings) -> Result<JoinRecord, SerializerError> {
    Ok(JoinRecord {
        split_task: join.split_task.clone(),
        threshold: join.threshold.as_ref().map(serialize_operand).transpose()?,
        cancel_remaining: join.cancel_remaining,
    })
}

fn serialize_conditions(
    choice: &ChoiceSettings,
) -> Result<Vec<(super::record::ExprRecord, String)>, SerializerError> {
    choice
        .cond_task_specs
        .iter()
        .map(|(cond, target)| Ok((serialize_operand(cond)?, target.clone())))
        .collect()
}

fn serialize_trigger(trigger: &TriggerSettings) -> Result<TriggerRecord, SerializerError> {
    Ok(TriggerRecord {
        context: trigger.context.clone(),
        times: serialize_operand(&trigger.times)?,
        queued: trigger.queued,
    })
}
