use std::cell::OnceCell;

use snafu::{ResultExt, Snafu};

use crate::secret::hasher::{self, PasswordHasher};

#[derive(Debug, Snafu, strum::IntoStaticStr)]
pub enum TemplateError {
    #[snafu(display("template references unknown placeholder {{{placeholder}}}"))]
    UnknownPlaceholder { placeholder: String },

    #[snafu(display("template has an unterminated placeholder starting at offset {offset}"))]
    UnterminatedPlaceholder { offset: usize },

    #[snafu(display("template has an unmatched closing brace at offset {offset}"))]
    UnmatchedBrace { offset: usize },

    #[snafu(display("failed to hash secret value"))]
    Hash { source: hasher::Error },
}

/// The named fields a secret template may reference.
///
/// The bcrypt hash is only computed when a template asks for it and then
/// reused for all further keys of the same secret.
pub struct SecretValues<'a> {
    namespace: &'a str,
    name: &'a str,
    plaintext: &'a str,
    hasher: &'a PasswordHasher,
    bcrypt_hash: OnceCell<String>,
}

impl<'a> SecretValues<'a> {
    pub fn new(
        namespace: &'a str,
        name: &'a str,
        plaintext: &'a str,
        hasher: &'a PasswordHasher,
    ) -> Self {
        Self {
            namespace,
            name,
            plaintext,
            hasher,
            bcrypt_hash: OnceCell::new(),
        }
    }

    fn lookup(&self, placeholder: &str) -> Result<String, TemplateError> {
        match placeholder {
            "namespace" => Ok(self.namespace.to_owned()),
            "name" => Ok(self.name.to_owned()),
            "plaintext" | "password" => Ok(self.plaintext.to_owned()),
            "bcryptHash" => {
                if let Some(hash) = self.bcrypt_hash.get() {
                    return Ok(hash.clone());
                }
                let hash = self.hasher.hash(self.plaintext).context(HashSnafu)?;
                Ok(self.bcrypt_hash.get_or_init(|| hash).clone())
            }
            placeholder => UnknownPlaceholderSnafu { placeholder }.fail(),
        }
    }
}

/// Resolves every `{field}` placeholder in `template`.
///
/// Literal braces are written as `{{` and `}}`.
pub fn render_template(template: &str, values: &SecretValues<'_>) -> Result<String, TemplateError> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(position) = rest.find(['{', '}']) {
        let offset = template.len() - rest.len() + position;
        rendered.push_str(&rest[..position]);
        let tail = &rest[position..];

        if let Some(after) = tail.strip_prefix("{{") {
            rendered.push('{');
            rest = after;
        } else if let Some(after) = tail.strip_prefix("}}") {
            rendered.push('}');
            rest = after;
        } else if tail.starts_with('}') {
            return UnmatchedBraceSnafu { offset }.fail();
        } else {
            let end = tail.find('}').ok_or(TemplateError::UnterminatedPlaceholder { offset })?;
            rendered.push_str(&values.lookup(&tail[1..end])?);
            rest = &tail[end + 1..];
        }
    }

    rendered.push_str(rest);
    Ok(rendered)
}

/// Escapes braces so `value` renders to itself.
pub fn escape(value: &str) -> String {
    value.replace('{', "{{").replace('}', "}}")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const HASHER: PasswordHasher = PasswordHasher::new(4);

    #[rstest]
    #[case("{namespace}/{name}", "app/tokens")]
    #[case("redis://:{plaintext}@host", "redis://:s3cr3t@host")]
    #[case("{password}", "s3cr3t")]
    #[case("no placeholders", "no placeholders")]
    #[case("{{literal}} {name}", "{literal} tokens")]
    #[case("", "")]
    fn render(#[case] template: &str, #[case] expected: &str) {
        let values = SecretValues::new("app", "tokens", "s3cr3t", &HASHER);
        assert_eq!(render_template(template, &values).unwrap(), expected);
    }

    #[test]
    fn unknown_placeholder() {
        let values = SecretValues::new("app", "tokens", "s3cr3t", &HASHER);
        let err = render_template("{username}", &values).unwrap_err();

        assert!(
            matches!(err, TemplateError::UnknownPlaceholder { ref placeholder } if placeholder == "username")
        );
        assert_eq!(
            err.to_string(),
            "template references unknown placeholder {username}"
        );
    }

    #[rstest]
    #[case("{name")]
    #[case("name}")]
    fn malformed(#[case] template: &str) {
        let values = SecretValues::new("app", "tokens", "s3cr3t", &HASHER);
        assert!(render_template(template, &values).is_err());
    }

    #[test]
    fn bcrypt_hash_is_computed_once() {
        let values = SecretValues::new("app", "tokens", "s3cr3t", &HASHER);
        let first = render_template("{bcryptHash}", &values).unwrap();
        let second = render_template("{bcryptHash}", &values).unwrap();

        assert_eq!(first.len(), 60);
        assert_eq!(first, second);
        assert!(bcrypt::verify("s3cr3t", &first).unwrap());
    }

    #[test]
    fn escape_round_trips() {
        let values = SecretValues::new("app", "tokens", "s3cr3t", &HASHER);
        let literal = "http://minio-{0...2}.svc/data";
        assert_eq!(render_template(&escape(literal), &values).unwrap(), literal);
    }
}
