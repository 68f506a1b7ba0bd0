//! Step IO normalization: maps each step type's argument shape to a uniform
//! list of named inputs and outputs.

use serde_json::Value;

use lineage_types::{IoSlot, Locator, StepDef};

// --- Argument extraction helpers ---

fn get<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for segment in path {
        current = current.get(segment)?;
    }
    Some(current)
}

fn get_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    get(value, path).and_then(Value::as_str)
}

fn get_array<'a>(value: &'a Value, path: &[&str]) -> &'a [Value] {
    get(value, path).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

fn push_slot(slots: &mut Vec<IoSlot>, name: &str, raw: Option<&Value>) {
    if let Some(locator) = raw.and_then(Locator::from_argument) {
        slots.push(IoSlot {
            name: name.to_string(),
            locator,
        });
    }
}

/// Normalize one step's type-specific arguments into `(inputs, outputs)`.
///
/// Unknown step types yield empty lists, never an error. A symbolic step
/// reference is kept as `Locator::StepRef`; it resolves only to a source step
/// id, not to an artifact.
pub fn normalize_step_io(step: &StepDef) -> (Vec<IoSlot>, Vec<IoSlot>) {
    let args = &step.arguments;
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();

    match step.step_type.as_str() {
        "Processing" => {
            for pin in get_array(args, &["ProcessingInputs"]) {
                let name = get_str(pin, &["InputName"]).unwrap_or("input");
                let raw = get(pin, &["S3Input", "S3Uri"])
                    .or_else(|| get(pin, &["DatasetDefinition"]))
                    .or_else(|| get(pin, &["Input"]));
                push_slot(&mut inputs, name, raw);
            }
            for pout in get_array(args, &["ProcessingOutputConfig", "Outputs"]) {
                let name = get_str(pout, &["OutputName"]).unwrap_or("output");
                push_slot(&mut outputs, name, get(pout, &["S3Output", "S3Uri"]));
            }
        }

        "Training" => {
            // Definitions carry the job request either wrapped or inline.
            let job = args.get("TrainingJobDefinition").unwrap_or(args);
            for channel in get_array(job, &["InputDataConfig"]) {
                let name = get_str(channel, &["ChannelName"]).unwrap_or("channel");
                push_slot(
                    &mut inputs,
                    name,
                    get(channel, &["DataSource", "S3DataSource", "S3Uri"]),
                );
            }
            push_slot(
                &mut outputs,
                "model_artifacts",
                get(job, &["OutputDataConfig", "S3OutputPath"]),
            );
        }

        "Transform" => {
            let job = args.get("TransformJobDefinition").unwrap_or(args);
            push_slot(
                &mut inputs,
                "transform_input",
                get(job, &["TransformInput", "DataSource", "S3DataSource", "S3Uri"]),
            );
            push_slot(
                &mut outputs,
                "transform_output",
                get(job, &["TransformOutput", "S3OutputPath"]),
            );
        }

        "ModelStep" | "RegisterModel" => {
            push_slot(
                &mut inputs,
                "model_data",
                get(args, &["Model", "PrimaryContainer", "ModelDataUrl"]),
            );
        }

        _ => {}
    }

    (inputs, outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(step_type: &str, arguments: serde_json::Value) -> StepDef {
        serde_json::from_value(json!({
            "Name": "step",
            "Type": step_type,
            "Arguments": arguments,
        }))
        .unwrap()
    }

    #[test]
    fn processing_inputs_and_outputs_with_declared_names() {
        let s = step(
            "Processing",
            json!({
                "ProcessingInputs": [
                    {"InputName": "raw", "S3Input": {"S3Uri": "s3://b/raw"}},
                    {"S3Input": {"S3Uri": "s3://b/aux"}}
                ],
                "ProcessingOutputConfig": {
                    "Outputs": [
                        {"OutputName": "train", "S3Output": {"S3Uri": "s3://b/train"}},
                        {"S3Output": {"S3Uri": "s3://b/extra"}}
                    ]
                }
            }),
        );
        let (inputs, outputs) = normalize_step_io(&s);
        assert_eq!(inputs, vec![IoSlot::uri("raw", "s3://b/raw"), IoSlot::uri("input", "s3://b/aux")]);
        assert_eq!(
            outputs,
            vec![IoSlot::uri("train", "s3://b/train"), IoSlot::uri("output", "s3://b/extra")]
        );
    }

    #[test]
    fn processing_input_with_symbolic_ref_becomes_step_ref() {
        let s = step(
            "Processing",
            json!({
                "ProcessingInputs": [
                    {"InputName": "model", "S3Input": {"S3Uri": {"Get": "Steps.Train.ModelArtifacts.S3ModelArtifacts"}}}
                ]
            }),
        );
        let (inputs, _) = normalize_step_io(&s);
        assert_eq!(inputs, vec![IoSlot::step_ref("model", "Train")]);
    }

    #[test]
    fn training_channels_and_model_artifacts_output() {
        let s = step(
            "Training",
            json!({
                "TrainingJobDefinition": {
                    "InputDataConfig": [
                        {"ChannelName": "train", "DataSource": {"S3DataSource": {"S3Uri": "s3://b/train"}}},
                        {"DataSource": {"S3DataSource": {"S3Uri": "s3://b/val"}}}
                    ],
                    "OutputDataConfig": {"S3OutputPath": "s3://b/model"}
                }
            }),
        );
        let (inputs, outputs) = normalize_step_io(&s);
        assert_eq!(
            inputs,
            vec![IoSlot::uri("train", "s3://b/train"), IoSlot::uri("channel", "s3://b/val")]
        );
        assert_eq!(outputs, vec![IoSlot::uri("model_artifacts", "s3://b/model")]);
    }

    #[test]
    fn training_arguments_may_inline_the_job_request() {
        let s = step(
            "Training",
            json!({
                "InputDataConfig": [
                    {"ChannelName": "train", "DataSource": {"S3DataSource": {"S3Uri": "s3://b/train"}}}
                ],
                "OutputDataConfig": {"S3OutputPath": "s3://b/model"}
            }),
        );
        let (inputs, outputs) = normalize_step_io(&s);
        assert_eq!(inputs, vec![IoSlot::uri("train", "s3://b/train")]);
        assert_eq!(outputs, vec![IoSlot::uri("model_artifacts", "s3://b/model")]);
    }

    #[test]
    fn transform_has_exactly_one_input_and_output() {
        let s = step(
            "Transform",
            json!({
                "TransformJobDefinition": {
                    "TransformInput": {"DataSource": {"S3DataSource": {"S3Uri": "s3://b/in"}}},
                    "TransformOutput": {"S3OutputPath": "s3://b/out"}
                }
            }),
        );
        let (inputs, outputs) = normalize_step_io(&s);
        assert_eq!(inputs, vec![IoSlot::uri("transform_input", "s3://b/in")]);
        assert_eq!(outputs, vec![IoSlot::uri("transform_output", "s3://b/out")]);
    }

    #[test]
    fn model_step_maps_model_data_input() {
        for step_type in ["ModelStep", "RegisterModel"] {
            let s = step(
                step_type,
                json!({"Model": {"PrimaryContainer": {"ModelDataUrl": "s3://b/model.tar.gz"}}}),
            );
            let (inputs, outputs) = normalize_step_io(&s);
            assert_eq!(inputs, vec![IoSlot::uri("model_data", "s3://b/model.tar.gz")]);
            assert!(outputs.is_empty());
        }
    }

    #[test]
    fn unknown_step_type_yields_empty_io() {
        let s = step("Condition", json!({"Conditions": []}));
        let (inputs, outputs) = normalize_step_io(&s);
        assert!(inputs.is_empty());
        assert!(outputs.is_empty());
    }

    #[test]
    fn missing_arguments_yield_empty_io() {
        let s: StepDef =
            serde_json::from_value(json!({"Name": "bare", "Type": "Processing"})).unwrap();
        let (inputs, outputs) = normalize_step_io(&s);
        assert!(inputs.is_empty());
        assert!(outputs.is_empty());
    }
}
