// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/utils/user_agent.rs
// Version: 1.1.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file builds the User-Agent sent with every template request.
//
// Tree Location:
// - src/utils/user_agent.rs (User-Agent string)
// - Depends on: std

pub fn get_user_agent() -> String {
    format!("graxil-solo/{} ({})", env!("CARGO_PKG_VERSION"), std::env::consts::OS)
}


// Changelog:
// - v1.1.0 (2025-07-05): Renamed for the solo miner.
// - v1.0.0 (2025-06-14): Initial User-Agent string.
