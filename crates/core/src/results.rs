//! Grouping of matches for the result list

use crate::annotation::MatchView;
use std::collections::HashMap;

/// Matches sharing one search term
#[derive(Debug, Clone)]
pub struct TermGroup<'a> {
    pub term: &'a str,
    pub matches: Vec<MatchView<'a>>,
}

/// Matches from one document
#[derive(Debug, Clone)]
pub struct FileGroup<'a> {
    pub file_index: usize,
    pub file_name: &'a str,
    pub matches: Vec<MatchView<'a>>,
}

/// Group by term, in order of first appearance
///
/// Matches keep their input order within a group.
pub fn group_by_term<'a>(views: &[MatchView<'a>]) -> Vec<TermGroup<'a>> {
    let mut groups: Vec<TermGroup<'a>> = Vec::new();
    let mut positions: HashMap<&'a str, usize> = HashMap::new();

    for view in views {
        let term = view.record.term.as_str();
        let position = *positions.entry(term).or_insert_with(|| {
            groups.push(TermGroup { term, matches: Vec::new() });
            groups.len() - 1
        });
        groups[position].matches.push(*view);
    }

    groups
}

/// Group by document, in order of first appearance
pub fn group_by_file<'a>(views: &[MatchView<'a>]) -> Vec<FileGroup<'a>> {
    let mut groups: Vec<FileGroup<'a>> = Vec::new();
    let mut positions: HashMap<usize, usize> = HashMap::new();

    for view in views {
        let record = view.record;
        let position = *positions.entry(record.file_index).or_insert_with(|| {
            groups.push(FileGroup {
                file_index: record.file_index,
                file_name: &record.file_name,
                matches: Vec::new(),
            });
            groups.len() - 1
        });
        groups[position].matches.push(*view);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationStore;
    use crate::document::Document;
    use crate::search::search;

    fn store() -> AnnotationStore {
        let documents = vec![
            Document::new(0, "a.pdf", vec!["tax then total".to_owned(), "total again".to_owned()]),
            Document::new(1, "b.pdf", vec!["tax".to_owned()]),
        ];
        AnnotationStore::new(search(&documents, &["total", "tax"]))
    }

    #[test]
    fn test_group_by_term_keeps_first_seen_order() {
        let store = store();
        let groups = group_by_term(&store.views());

        let terms: Vec<&str> = groups.iter().map(|group| group.term).collect();
        assert_eq!(terms, vec!["total", "tax"]);

        let pages: Vec<(usize, usize)> = groups[0]
            .matches
            .iter()
            .map(|view| (view.record.file_index, view.record.page_number))
            .collect();
        assert_eq!(pages, vec![(0, 1), (0, 2)]);

        let files: Vec<usize> = groups[1].matches.iter().map(|view| view.record.file_index).collect();
        assert_eq!(files, vec![0, 1]);
    }

    #[test]
    fn test_group_by_file() {
        let store = store();
        let groups = group_by_file(&store.views());

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].file_name, "a.pdf");
        assert_eq!(groups[0].matches.len(), 3);
        assert_eq!(groups[1].file_index, 1);
        assert_eq!(groups[1].matches.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(group_by_term(&[]).is_empty());
        assert!(group_by_file(&[]).is_empty());
    }
}
