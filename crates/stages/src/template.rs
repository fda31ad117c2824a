//! URL templates parameterised by fingerprint fields, e.g.
//! `api/v1/projects/{projectId}`.

use pipeline::{Fingerprint, PipelineError};

/// Substitutes every `{field}` placeholder in `template` with the value of
/// that fingerprint field.
///
/// Unknown fields and unbalanced braces are configuration errors, reported
/// before any request is made.
pub fn render(template: &str, fingerprint: &Fingerprint) -> Result<String, PipelineError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            PipelineError::configuration(format!("unclosed '{{' in URL template '{template}'"))
        })?;
        let name = &after[..close];
        let value = fingerprint.get(name).ok_or_else(|| {
            PipelineError::configuration(format!(
                "URL template '{template}' references '{name}', which is not in fingerprint {fingerprint}"
            ))
        })?;
        out.push_str(&value.to_string());
        rest = &after[close + 1..];
    }
    if rest.contains('}') {
        return Err(PipelineError::configuration(format!(
            "unmatched '}}' in URL template '{template}'"
        )));
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp() -> Fingerprint {
        Fingerprint::new()
            .with_int("connectionId", 1)
            .with_int("projectId", 42)
    }

    #[test]
    fn test_render_substitutes_fields() {
        assert_eq!(
            render("api/v1/projects/{projectId}", &fp()).unwrap(),
            "api/v1/projects/42"
        );
        assert_eq!(
            render("c/{connectionId}/p/{projectId}", &fp()).unwrap(),
            "c/1/p/42"
        );
        assert_eq!(render("api/v1/userstories", &fp()).unwrap(), "api/v1/userstories");
    }

    #[test]
    fn test_render_rejects_unknown_and_unbalanced() {
        let err = render("api/{boardId}", &fp()).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
        assert!(err.to_string().contains("boardId"));
        assert!(render("api/{projectId", &fp()).is_err());
        assert!(render("api/projectId}", &fp()).is_err());
    }
}
