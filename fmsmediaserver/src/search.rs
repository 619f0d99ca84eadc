//! Dialecte de recherche ContentDirectory
//!
//! Le langage de critères UPnP est vaste ; les renderers du commerce n'en
//! utilisent qu'un fragment. On reconnaît `*`, `upnp:class derivedfrom "…"`,
//! `upnp:class = "…"`, `dc:title contains "…"` et leurs conjonctions `and`.
//! Tout terme inconnu dégrade en un terme qui ne matche rien.

use crate::device::MediaServer;
use crate::objects::{safe_join, Entry, ROOT_OBJECT_ID};
use fmsupnp::UpnpError;

/// Un terme de critère reconnu
#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    MatchAll,
    ClassDerivedFrom(String),
    ClassIs(String),
    TitleContains(String),
    /// Terme non supporté : ne matche rien
    Nothing,
}

impl Term {
    fn matches(&self, class: &str, title: &str) -> bool {
        match self {
            Term::MatchAll => true,
            Term::ClassDerivedFrom(prefix) => class.starts_with(prefix.as_str()),
            Term::ClassIs(wanted) => class == wanted,
            Term::TitleContains(needle) => {
                title.to_lowercase().contains(&needle.to_lowercase())
            }
            Term::Nothing => false,
        }
    }
}

/// Critères de recherche parsés : conjonction de termes.
#[derive(Debug, Clone)]
pub struct SearchCriteria {
    terms: Vec<Term>,
}

impl SearchCriteria {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() || input == "*" {
            return Self {
                terms: vec![Term::MatchAll],
            };
        }
        let terms = split_conjunction(input)
            .into_iter()
            .map(|clause| parse_term(clause.trim()))
            .collect();
        Self { terms }
    }

    pub fn matches(&self, class: &str, title: &str) -> bool {
        self.terms.iter().all(|t| t.matches(class, title))
    }
}

/// Découpe sur ` and ` hors guillemets.
fn split_conjunction(input: &str) -> Vec<&str> {
    let mut clauses = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => in_quotes = !in_quotes,
            b' ' if !in_quotes => {
                if let Some(rest) = input.get(i..i + 5) {
                    if rest.eq_ignore_ascii_case(" and ") {
                        clauses.push(&input[start..i]);
                        start = i + 5;
                        i += 4;
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }
    clauses.push(&input[start..]);
    clauses
}

fn parse_term(clause: &str) -> Term {
    if clause == "*" {
        return Term::MatchAll;
    }
    let Some((prop, rest)) = clause.split_once(char::is_whitespace) else {
        return Term::Nothing;
    };
    let rest = rest.trim();
    let Some((op, value)) = rest.split_once(char::is_whitespace) else {
        return Term::Nothing;
    };
    let value = value.trim().trim_matches('"').to_string();

    match (prop, op) {
        ("upnp:class", "derivedfrom") => Term::ClassDerivedFrom(value),
        ("upnp:class", "=") => Term::ClassIs(value),
        ("dc:title", "contains") => Term::TitleContains(value),
        _ => Term::Nothing,
    }
}

impl MediaServer {
    /// Recherche récursive filtrée sous un container.
    ///
    /// Parcourt le sous-arbre en profondeur, règles d'ignore appliquées, et
    /// retient les objets dont la classe et le titre satisfont les critères.
    pub async fn search(
        &self,
        container_id: &str,
        criteria: &SearchCriteria,
        host: &str,
        user_agent: &str,
    ) -> Result<Vec<Entry>, UpnpError> {
        // Valide le point de départ
        if container_id != ROOT_OBJECT_ID {
            let abs = safe_join(&self.config.root_object_path, container_id);
            if self.is_ignored(&abs) || !abs.is_dir() {
                return Err(UpnpError::no_such_object());
            }
        }

        let mut results = Vec::new();
        let mut pending = vec![container_id.to_string()];
        while let Some(dir_id) = pending.pop() {
            let children = self
                .browse_direct_children(&dir_id, host, user_agent)
                .await?;
            for entry in children {
                if entry.is_container() {
                    pending.push(entry.id().to_string());
                }
                if criteria.matches(entry.class(), entry.title()) {
                    results.push(entry);
                }
            }
        }
        Ok(results)
    }
}
