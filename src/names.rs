// ABOUTME: Random human-readable names for deployments created without one.
// ABOUTME: Three words (adverb, adjective, noun) joined by hyphens, e.g. "gently-brave-otter".

use rand::Rng;

const ADVERBS: &[&str] = &[
    "abruptly", "actually", "badly", "boldly", "briefly", "calmly", "closely", "deeply",
    "eagerly", "early", "easily", "evenly", "fairly", "firmly", "freely", "gently", "gladly",
    "greatly", "happily", "highly", "honestly", "humbly", "jointly", "kindly", "largely",
    "lately", "lightly", "loudly", "mainly", "merely", "mostly", "neatly", "nicely", "openly",
    "partly", "politely", "promptly", "quickly", "quietly", "rapidly", "rarely", "really",
    "safely", "sharply", "simply", "slowly", "smoothly", "softly", "solely", "strongly",
    "surely", "swiftly", "tightly", "truly", "vastly", "warmly", "wildly", "wisely",
];

const ADJECTIVES: &[&str] = &[
    "able", "amazed", "amused", "apt", "awake", "big", "bold", "brave", "bright", "busy",
    "calm", "clean", "clear", "clever", "cool", "cosmic", "crisp", "cuddly", "daring", "deep",
    "eager", "easy", "epic", "fair", "fancy", "fast", "fine", "fluent", "fond", "free", "fresh",
    "game", "gentle", "glad", "golden", "grand", "happy", "hardy", "helpful", "honest", "humble",
    "ideal", "jolly", "keen", "kind", "lively", "loyal", "lucky", "merry", "modest", "neat",
    "nice", "noble", "polite", "proud", "quick", "quiet", "rapid", "ready", "sharp", "shiny",
    "smart", "steady", "sunny", "super", "sweet", "tidy", "tough", "trusty", "vital", "warm",
    "wise", "witty", "young", "zesty",
];

const NOUNS: &[&str] = &[
    "akita", "alpaca", "badger", "beagle", "bear", "beaver", "bison", "bobcat", "buffalo",
    "camel", "cat", "cheetah", "cobra", "condor", "corgi", "cougar", "coyote", "crane", "crow",
    "deer", "dingo", "dodo", "dolphin", "dove", "eagle", "eel", "elk", "falcon", "ferret",
    "finch", "fox", "gazelle", "gecko", "gibbon", "goose", "gopher", "hawk", "heron", "horse",
    "husky", "ibex", "iguana", "jackal", "jaguar", "kite", "koala", "lemur", "leopard", "lion",
    "llama", "lynx", "macaw", "marmot", "mink", "mole", "moose", "newt", "ocelot", "orca",
    "osprey", "otter", "owl", "panda", "panther", "parrot", "pelican", "penguin", "puffin",
    "puma", "quail", "rabbit", "raven", "robin", "salmon", "seal", "shark", "sloth", "snail",
    "sparrow", "swan", "tiger", "toucan", "trout", "turtle", "viper", "walrus", "weasel",
    "whale", "wolf", "wombat", "yak", "zebra",
];

/// Generate a name with the thread-local generator.
pub fn generate() -> String {
    generate_with(&mut rand::rng())
}

pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let pick = |rng: &mut R, words: &[&'static str]| words[rng.random_range(0..words.len())];
    let adverb = pick(rng, ADVERBS);
    let adjective = pick(rng, ADJECTIVES);
    let noun = pick(rng, NOUNS);
    format!("{}-{}-{}", adverb, adjective, noun)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeploymentName;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn generated_names_are_valid_deployment_names() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let name = generate_with(&mut rng);
            assert_eq!(name.split('-').count(), 3, "{}", name);
            assert!(DeploymentName::new(&name).is_ok(), "{}", name);
        }
    }

    #[test]
    fn same_seed_same_name() {
        let a = generate_with(&mut StdRng::seed_from_u64(42));
        let b = generate_with(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn word_lists_are_lowercase_ascii() {
        for word in ADVERBS.iter().chain(ADJECTIVES).chain(NOUNS) {
            assert!(word.chars().all(|c| c.is_ascii_lowercase()), "{}", word);
        }
    }
}
