use proptest::prelude::*;

use shellrunner::config::{join_arguments, split_arguments};

proptest! {
    #[test]
    fn joined_arguments_split_back_unchanged(args in prop::collection::vec(any::<String>(), 0..8)) {
        let line = join_arguments(&args);
        let split = split_arguments(&line).expect("joined arguments always split");
        prop_assert_eq!(split, args);
    }

    #[test]
    fn plain_words_split_on_whitespace(words in prop::collection::vec("[a-zA-Z0-9_./-]{1,12}", 1..8)) {
        let line = words.join("  ");
        prop_assert_eq!(split_arguments(&line).expect("plain words split"), words);
    }
}
