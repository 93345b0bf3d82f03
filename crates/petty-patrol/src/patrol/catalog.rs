use super::domain::{Badge, Behavior, Deal};

/// Reserved behavior that requires a free-text note when tagged alone.
pub const OTHER_BEHAVIOR: &str = "other_custom";

pub const FIRST_CATCH_BADGE: &str = "first_catch";
pub const LEGENDARY_BADGE: &str = "legendary";

/// Minimum behaviors on a single report for the legendary badge.
pub const LEGENDARY_THRESHOLD: usize = 4;

pub const POINTS_PER_REPORT: u32 = 50;

pub static BEHAVIORS: [Behavior; 11] = [
    Behavior {
        id: "lane_leaper",
        name: "Lane Leaper",
        description: "Changing lanes without looking.",
        icon: "⚡",
    },
    Behavior {
        id: "unhinged_honker",
        name: "Unhinged Honker",
        description: "Honking at nothing.",
        icon: "📢",
    },
    Behavior {
        id: "texting_zombie",
        name: "Texting Zombie",
        description: "Eyes on the phone, not the road.",
        icon: "🧟",
    },
    Behavior {
        id: "road_rager",
        name: "Road Rager",
        description: "Yelling or aggressive driving.",
        icon: "🤬",
    },
    Behavior {
        id: "no_signal_phantom",
        name: "No-Signal Phantom",
        description: "Never uses turn signals.",
        icon: "👻",
    },
    Behavior {
        id: "stop_sign_skipper",
        name: "Stop Sign Skipper",
        description: "Rolling through stops.",
        icon: "🛑",
    },
    Behavior {
        id: "parking_menace",
        name: "Parking Menace",
        description: "Taking two spots or blocking.",
        icon: "🅿️",
    },
    Behavior {
        id: "speed_demon",
        name: "Speed Demon",
        description: "Way too fast for conditions.",
        icon: "🏎️",
    },
    Behavior {
        id: "turtle_mode",
        name: "Turtle Mode",
        description: "Driving painfully slow.",
        icon: "🐢",
    },
    Behavior {
        id: "traffic_blocker",
        name: "Traffic Blocker",
        description: "Blocking the box.",
        icon: "🧱",
    },
    Behavior {
        id: OTHER_BEHAVIOR,
        name: "Other",
        description: "Something else? Write it down.",
        icon: "✏️",
    },
];

pub fn behavior(id: &str) -> Option<&'static Behavior> {
    BEHAVIORS.iter().find(|behavior| behavior.id == id)
}

/// Behavior badges: id, name, description, icon, and the behavior that unlocks it.
const BEHAVIOR_BADGES: [(&str, &str, &str, &str, &str); 10] = [
    ("lane_leaper", "Weaver", "Caught a Lane Leaper.", "⚡", "lane_leaper"),
    ("honker", "Silencer", "Caught an Unhinged Honker.", "📢", "unhinged_honker"),
    ("zombie", "Eye Opener", "Caught a Texting Zombie.", "🧟", "texting_zombie"),
    ("rager", "Zen Master", "Caught a Road Rager.", "🤬", "road_rager"),
    ("phantom", "Ghostbuster", "Caught a No-Signal Phantom.", "👻", "no_signal_phantom"),
    ("skipper", "Full Stop", "Caught a Stop Sign Skipper.", "🛑", "stop_sign_skipper"),
    ("menace", "Space Saver", "Caught a Parking Menace.", "🅿️", "parking_menace"),
    ("demon", "Speed Trap", "Caught a Speed Demon.", "🏎️", "speed_demon"),
    ("turtle", "Pace Maker", "Caught a Turtle Mode driver.", "🐢", "turtle_mode"),
    ("blocker", "Unblocker", "Caught a Traffic Blocker.", "🧱", "traffic_blocker"),
];

pub fn seed_badges() -> Vec<Badge> {
    let mut badges = vec![
        Badge::new(FIRST_CATCH_BADGE, "First Catch", "Your first-ever report.", "🛡️", None),
    ];
    badges.extend(
        BEHAVIOR_BADGES
            .iter()
            .map(|&(id, name, description, icon, behavior)| {
                Badge::new(id, name, description, icon, Some(behavior))
            }),
    );
    badges.push(Badge::new(
        LEGENDARY_BADGE,
        "Ultimate Miami Driver",
        "Caught a driver doing EVERYTHING wrong.",
        "😱",
        None,
    ));
    badges
}

pub fn seed_deals() -> Vec<Deal> {
    vec![
        Deal::new(
            "joe_crab",
            "Joe's Stone Crab Shack",
            "Free Key Lime Pie",
            "With any entree purchase",
            "PARTNER_JOE",
            "11 Washington Ave",
        ),
        Deal::new(
            "cafe_cubano",
            "Café Cubano Express",
            "BOGO Colada",
            "Buy one get one free",
            "PARTNER_CUBANO",
            "8th St & Ocean Dr",
        ),
        Deal::new(
            "ocean_tacos",
            "Ocean Drive Tacos",
            "15% Off Tacos",
            "Valid for lunch only",
            "PARTNER_TACOS",
            "Lincoln Road Mall",
        ),
    ]
}
