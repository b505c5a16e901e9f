use roam_db::models::UserRow;
use roam_types::api::PublicProfile;

use crate::convert::parse_uuid;

/// Render a user for anyone who is not the user themselves. The projection
/// carries identity, initials and reputation score — nothing else leaves
/// this function.
pub fn project(user: &UserRow) -> PublicProfile {
    PublicProfile {
        user_id: parse_uuid(&user.id, "user"),
        initials: initials(&user.display_name),
        reputation: user.reputation,
    }
}

/// First character of the first whitespace-delimited token, uppercased;
/// plus the first character of the last token when there is more than one.
/// An empty name falls back to "U".
pub fn initials(display_name: &str) -> String {
    let mut tokens = display_name.split_whitespace();
    let Some(first) = tokens.next() else {
        return "U".to_string();
    };

    let mut out: String = first.chars().take(1).flat_map(char::to_uppercase).collect();
    if let Some(last) = tokens.last() {
        out.extend(last.chars().take(1).flat_map(char::to_uppercase));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn two_tokens_use_first_and_last() {
        assert_eq!(initials("Ada Lovelace"), "AL");
    }

    #[test]
    fn middle_names_are_skipped() {
        assert_eq!(initials("Jean de la Fontaine"), "JF");
    }

    #[test]
    fn single_token_gives_one_initial() {
        assert_eq!(initials("cher"), "C");
    }

    #[test]
    fn empty_and_blank_fall_back_to_u() {
        assert_eq!(initials(""), "U");
        assert_eq!(initials("   "), "U");
    }

    #[test]
    fn projection_exposes_only_initials_and_score() {
        let db = testutil::test_db();
        let id = testutil::user(&db, "mira", "Mira Solberg");
        let row = db.get_user(&id.to_string()).unwrap().unwrap();

        let profile = project(&row);
        assert_eq!(profile.user_id, id);
        assert_eq!(profile.initials, "MS");
        assert_eq!(profile.reputation, 0);
    }
}
