use crate::ClassifyError;
use netfetch_core::{Expression, Operator, Selector};
use netfetch_k8s_api::LabelSelector;

/// Validates a single label selector requirement.
pub(crate) fn expression(
    policy: &str,
    key: String,
    operator: &str,
    values: Option<Vec<String>>,
) -> Result<Expression, ClassifyError> {
    let operator = operator
        .parse::<Operator>()
        .map_err(|e| ClassifyError::selector(policy, &key, e))?;
    let values = values.unwrap_or_default();
    match operator {
        Operator::In | Operator::NotIn if values.is_empty() => {
            return Err(ClassifyError::selector(
                policy,
                key,
                format_args!("{operator:?} requires at least one value"),
            ));
        }
        Operator::Exists | Operator::DoesNotExist if !values.is_empty() => {
            return Err(ClassifyError::selector(
                policy,
                key,
                format_args!("{operator:?} does not accept values"),
            ));
        }
        _ => {}
    }
    Ok(Expression::new(key, operator, values))
}

/// Converts a Kubernetes label selector. A missing selector selects everything.
pub(crate) fn label_selector(
    policy: &str,
    selector: Option<LabelSelector>,
) -> Result<Selector, ClassifyError> {
    let LabelSelector {
        match_labels,
        match_expressions,
    } = selector.unwrap_or_default();

    let expressions = match_expressions
        .into_iter()
        .flatten()
        .map(|req| expression(policy, req.key, &req.operator, req.values))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Selector::new(match_labels.unwrap_or_default(), expressions))
}
