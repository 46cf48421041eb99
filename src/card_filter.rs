//! Local, typo-tolerant filtering of the loaded card list.

use std::collections::HashSet;

use indicium::simple::{Indexable, SearchIndex};
use itertools::Itertools;
use strsim::levenshtein;

use crate::models::Card;

/// Searchable keywords of one card: name, set code and set name.
struct CardKeywords<'a>(&'a Card);

impl Indexable for CardKeywords<'_> {
    fn strings(&self) -> Vec<String> {
        let card = self.0;
        let mut strings = vec![card.name.clone(), card.set.clone()];
        strings.extend(card.set_name.clone());
        strings
    }
}

fn preprocess_text(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == ',' || *c == '\'')
        .collect::<String>()
        .to_lowercase()
}

fn correct_word(word: &str, dictionary: &HashSet<String>) -> String {
    if dictionary.contains(word) {
        return word.to_string();
    }

    dictionary
        .iter()
        .map(|dict_word| (levenshtein(word, dict_word), dict_word))
        .min_by_key(|(dist, _)| *dist)
        .map(|(_, word)| word.to_string())
        .unwrap_or_else(|| word.to_string())
}

fn name_tokens(cards: &[Card]) -> HashSet<String> {
    cards
        .iter()
        .flat_map(|card| {
            preprocess_text(&card.name)
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn find_cards(text: &str, index: &SearchIndex<usize>) -> Vec<usize> {
    index.search(text).into_iter().copied().collect()
}

/// Cards whose name or set matches `query`, in list order. A query with no
/// direct hit is retried with each word snapped to the closest name token.
/// An empty query keeps every card.
pub fn filter_cards(cards: &[Card], query: &str) -> Vec<Card> {
    let query = preprocess_text(query);
    if query.trim().is_empty() {
        return cards.to_vec();
    }

    let index = cards
        .iter()
        .enumerate()
        .fold(SearchIndex::default(), |mut acc, (position, card)| {
            acc.insert(&position, &CardKeywords(card));
            acc
        });

    let mut hits = find_cards(&query, &index);
    if hits.is_empty() {
        let dictionary = name_tokens(cards);
        let corrected = query
            .split_whitespace()
            .map(|word| correct_word(word, &dictionary))
            .join(" ");

        tracing::debug!("no match for {:?}, retrying as {:?}", query, corrected);
        if corrected != query {
            hits = find_cards(&corrected, &index);
        }
    }

    hits.into_iter()
        .sorted()
        .dedup()
        .filter_map(|position| cards.get(position).cloned())
        .collect()
}
