table! {
    analytics (id) {
        id -> Int8,
        event_type -> Varchar,
        event_data -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

table! {
    bookings (id) {
        id -> Int8,
        user_id -> Nullable<Int8>,
        ground_number -> Int2,
        booking_date -> Date,
        start_time -> Time,
        end_time -> Time,
        duration -> Int2,
        player_count -> Int2,
        total_amount -> Int4,
        payment_method -> Varchar,
        payment_status -> Varchar,
        payment_screenshot -> Nullable<Varchar>,
        booking_status -> Varchar,
        notes -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

table! {
    users (id) {
        id -> Int8,
        name -> Varchar,
        email -> Varchar,
        phone -> Nullable<Varchar>,
        password -> Varchar,
        is_admin -> Bool,
        created_at -> Timestamptz,
    }
}

joinable!(bookings -> users (user_id));

allow_tables_to_appear_in_same_query!(
    analytics,
    bookings,
    users,
);
