// Shared by both backends; timestamps are unix milliseconds so the
// column types line up across dialects.

diesel::table! {
    usernames (id) {
        id -> Text,
        name -> Nullable<Text>,
    }
}

diesel::table! {
    channels (id) {
        id -> Text,
        name -> Nullable<Text>,
    }
}

diesel::table! {
    rolls (timestamp, channel_id) {
        timestamp -> BigInt,
        channel_id -> Text,
        user_id -> Text,
        value -> BigInt,
    }
}

diesel::allow_tables_to_appear_in_same_query!(usernames, channels, rolls);
