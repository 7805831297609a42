use ipset_netlink::hl::ipset::Conn;
use ipset_netlink::proto::NetlinkSocket;
use ipset_netlink::uapi;

fn main() {
    let sock = match NetlinkSocket::netfilter() {
        Ok(s) => s,
        Err(e) => {
            println!("error: {}", e);
            return;
        }
    };
    let mut conn = Conn::new(sock, uapi::NFPROTO_IPV4);

    match conn.list_all() {
        Err(e) => println!("error: {}", e),
        Ok(sets) => {
            for set in sets {
                println!("{} ({}, revision {})", set.name, set.type_name, set.revision);
                for entry in set.entries.iter() {
                    println!("  {:?}", entry);
                }
            }
        }
    }
}
