//! Session-id generator: three random words from a fixed list, hyphen-joined.

use rand::Rng;

#[rustfmt::skip]
const WORDS: &[&str] = &[
    "amber", "birch", "cedar", "delta", "ember", "fern", "glade", "harbor",
    "iris", "juniper", "kestrel", "lagoon", "maple", "nimbus", "opal", "pebble",
    "quartz", "river", "sable", "thistle", "umber", "violet", "willow", "xenon",
    "yarrow", "zephyr", "anchor", "breeze", "comet", "drift", "ember", "flint",
    "grove", "haven", "indigo", "jade", "knoll", "lark", "meadow", "north",
    "orbit", "prism", "quill", "ridge", "shale", "tundra", "ursa", "vale",
    "wren", "yucca", "zenith", "aspen", "basin", "coral", "dune", "echo",
];

/// Generate a fresh three-word session id, e.g. `"amber-river-quartz"`.
pub fn generate() -> String {
    let mut rng = rand::rng();
    let pick = |rng: &mut rand::rngs::ThreadRng| WORDS[rng.random_range(0..WORDS.len())];
    format!("{}-{}-{}", pick(&mut rng), pick(&mut rng), pick(&mut rng))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_three_hyphenated_words() {
        let id = generate();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        for part in parts {
            assert!(WORDS.contains(&part));
        }
    }

    #[test]
    fn generates_distinct_ids() {
        let ids: std::collections::HashSet<String> = (0..50).map(|_| generate()).collect();
        assert!(ids.len() > 1, "expected variation across 50 generated ids");
    }
}
