//! Non-overridable safety floor.
//!
//! Publishing a like or a comment on an externally visible social surface is
//! always denied, whatever the configured policy says. The floor is checked
//! before classification and cannot be disabled or reconfigured.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use crate::gate::classifier::identifier_words;
use crate::tools::Tool;

/// Rationale reported for every floor denial.
pub const SAFETY_FLOOR_RATIONALE: &str =
    "safety floor: publishing likes/comments on external social surfaces is never permitted (like/comment restriction)";

/// Name words naming a like or comment action, platform synonyms included.
const LIKE_COMMENT_WORDS: &[&str] = &[
    "like", "likes", "liked", "liking", "unlike", "comment", "comments", "commented",
    "commenting", "upvote", "upvotes", "upvoted", "favorite", "favorites", "favorited",
    "favourite", "favourites", "favourited", "fave", "faves",
];

/// Noun forms that may follow a read verb in a read-only tool name.
const LIKE_COMMENT_NOUNS: &[&str] = &[
    "like", "likes", "comment", "comments", "upvote", "upvotes", "favorite", "favorites",
    "favourite", "favourites",
];

/// Object words allowed alongside the noun in a read-only name (`get_post_comments`).
const READ_OBJECTS: &[&str] = &[
    "post", "posts", "photo", "photos", "video", "videos", "tweet", "tweets", "media", "count",
    "counts", "recent", "all", "my", "user", "thread",
];

/// Verbs that open a read-only like/comment tool name.
const READ_VERBS: &[&str] = &["get", "list", "fetch", "read", "search", "count", "view"];

/// Description patterns announcing a like/comment publish action.
const PUBLISH_PATTERNS: &[&str] = &[
    // Like as the leading verb of a sentence or clause: "Likes the given post".
    r"(^|[.!?;]\s+|\b(to|and|then)\s+)(likes?|liking|upvotes?|upvoting|favou?rites?|favou?riting)\b",
    // Like followed by a social object: "like a post", "upvote the latest comment".
    r"\b(likes?|liking|upvotes?|upvoting|favou?rites?|favou?riting)\s+((a|an|the|this|that|their|its|any|every|some)\s+)?(\w+\s+)?(posts?|comments?|tweets?|photos?|videos?|pictures?|images?|stor(y|ies)|reels?|pins?|status(es)?|updates?|content)\b",
    r"\bcomment(ing)?\s+on\b",
    r"(^|[.!?;]\s+|\b(to|and|then)\s+)comments\s+on\b",
    r"\b(post(s|ing)?|leav(e|es|ing)|add(s|ing)?|writ(e|es|ing)|publish(es|ing)?|submit(s|ting)?)\s+((a|an|the|your|their)\s+)?((new|short|public|quick|reply)\s+)?comments?\b",
    r"\brepl(y|ies|ying)\s+with\s+(a\s+)?comment",
];

static PUBLISH_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    PUBLISH_PATTERNS
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .expect("floor pattern compiles")
        })
        .collect()
});

/// Whether a descriptor is a like/comment publish action.
pub fn is_like_or_comment_publish(tool: &dyn Tool) -> bool {
    violates_floor(tool.name(), tool.description())
}

/// `get_comments`, `list_likes`, `count_post_likes`: a read verb followed only
/// by like/comment nouns and object words.
fn is_read_only_name(words: &[String]) -> bool {
    let Some((verb, rest)) = words.split_first() else {
        return false;
    };
    READ_VERBS.contains(&verb.as_str())
        && rest.iter().any(|w| LIKE_COMMENT_NOUNS.contains(&w.as_str()))
        && rest.iter().all(|w| {
            LIKE_COMMENT_NOUNS.contains(&w.as_str()) || READ_OBJECTS.contains(&w.as_str())
        })
}

pub fn violates_floor(name: &str, description: &str) -> bool {
    let words = identifier_words(name);
    if words.iter().any(|w| LIKE_COMMENT_WORDS.contains(&w.as_str())) && !is_read_only_name(&words)
    {
        return true;
    }
    PUBLISH_REGEXES.iter().any(|re| re.is_match(description))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_and_comment_names_violate() {
        for name in [
            "like_post",
            "post_comment",
            "add_comment",
            "instagram-like",
            "LikePhoto_like",
            "comment",
            "unlike_tweet",
        ] {
            assert!(violates_floor(name, ""), "{name} should hit the floor");
        }
    }

    #[test]
    fn test_read_only_and_unrelated_names_pass() {
        for name in [
            "get_comments",
            "list_likes",
            "get_weather",
            "likely_outcome",
            "demote_creator",
            "search_pinterest",
        ] {
            assert!(!violates_floor(name, ""), "{name} should not hit the floor");
        }
    }

    #[test]
    fn test_description_phrases_violate() {
        assert!(violates_floor("engage", "Comment on a user's latest post"));
        assert!(violates_floor("social_action", "Like a post by id"));
        assert!(!violates_floor("get_weather", "Looks like rain? Get the forecast"));
        // A read-shaped name does not excuse a publishing description.
        assert!(violates_floor("get_comments", "Comment on the latest post"));
        assert!(!violates_floor("get_comments", "Fetch comments on a post"));
    }

    #[test]
    fn test_camel_case_names_violate() {
        for name in ["likePost", "commentOnPost", "LikePhoto", "upvoteThread", "addFavorite"] {
            assert!(violates_floor(name, ""), "{name} should hit the floor");
        }
    }

    #[test]
    fn test_read_verb_only_exempts_pure_read_shapes() {
        for name in [
            "fetch_and_like_post",
            "read_then_comment",
            "get_post_and_like_it",
            "getPostThenLikeIt",
            "list_and_comment",
        ] {
            assert!(violates_floor(name, ""), "{name} should hit the floor");
        }
        for name in ["get_post_comments", "countLikes", "list_favorites", "view_comment_count"] {
            assert!(!violates_floor(name, ""), "{name} should not hit the floor");
        }
    }

    #[test]
    fn test_inflected_descriptions_violate() {
        for description in [
            "Likes the given post",
            "Fetches a post and likes it",
            "Upvote the top comment in a thread",
            "Posts a comment under a photo",
            "Leaves a short comment",
            "Comments on the latest story",
            "Favorite a tweet by id",
        ] {
            assert!(violates_floor("engage", description), "{description:?} should hit the floor");
        }
        for description in [
            "Get the forecast. Looks like rain?",
            "Fetch comments on a post",
            "Search images that look like a sketch",
            "List posts and comments from a user",
        ] {
            assert!(!violates_floor("helper", description), "{description:?} should not hit the floor");
        }
    }

    #[test]
    fn test_rationale_mentions_restriction() {
        assert!(SAFETY_FLOOR_RATIONALE.contains("like/comment"));
    }
}
